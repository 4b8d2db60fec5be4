//! End-to-end capture tests: controller, render worker and WAV output.
//!
//! Run with:
//! ```bash
//! cargo test -p autosample --test capture_integration
//! ```

#[path = "helpers/mod.rs"]
mod helpers;

use autosample::prelude::*;
use autosample::{MessageBody, StatusLine};
use helpers::{
    assert_patched_sizes, files_with_extension, find_chunk, run_capture, run_until, test_settings,
    test_system, wait_for, Instrument, TEST_SAMPLE_RATE,
};

const MAX_FRAMES: usize = 200_000;

// =============================================================================
// Record Mode
// =============================================================================

#[test]
fn test_record_writes_one_wav_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("Keys");
    let mut settings = test_settings(&root, OutputFormat::WavOnly, 60, 62);
    settings.planner.velocity_layers = 2;

    let (mut system, mut controller) = test_system(settings);
    let session = system.start_record().unwrap();
    assert_eq!(session.len(), 6);

    let timeline = run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    assert_eq!(timeline.last().map(|f| f.state), Some(CaptureState::Inactive));

    let handle = system.handle();
    assert!(wait_for(|| handle.metrics().files_written == 6));
    system.shutdown();

    let wavs = files_with_extension(&root.join("wav"), "wav");
    assert_eq!(wavs.len(), 6);
    for job in &session.jobs {
        let path = root.join("wav").join(job.file_name());
        assert!(wavs.contains(&path), "missing {}", path.display());
        assert_patched_sizes(&path);

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, TEST_SAMPLE_RATE as u32);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        let peak = samples.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(peak > 0.05, "{} is silent", path.display());
        for frame in samples.chunks_exact(2) {
            approx::assert_relative_eq!(frame[0], -frame[1]);
        }
    }

    let messages = system.poll_messages();
    assert!(messages.iter().all(|m| !m.is_error()), "{:?}", messages);
    assert!(messages.iter().any(|m| m.to_string() == "END RENDER"));
    assert_eq!(system.dropped_commands(), 0);
}

#[test]
fn test_gate_high_only_in_gated_record() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir.path().join("Gate"), OutputFormat::WavOnly, 60, 61);
    let (system, mut controller) = test_system(settings);
    system.start_test().unwrap();

    let timeline = run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    let gated = timeline
        .iter()
        .filter(|f| f.state == CaptureState::GatedRecord)
        .count();
    assert!(gated > 0);

    for frame in &timeline {
        assert_eq!(
            frame.cv.gate > 0.0,
            frame.state == CaptureState::GatedRecord,
            "gate {} in {:?}",
            frame.cv.gate,
            frame.state
        );
    }
}

#[test]
fn test_gate_time_in_frames() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(&dir.path().join("Gate"), OutputFormat::WavOnly, 60, 60);
    let expected = settings.gate_frames(TEST_SAMPLE_RATE) as usize;
    let (system, mut controller) = test_system(settings);
    system.start_test().unwrap();

    let timeline = run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    let gated = timeline.iter().filter(|f| f.cv.gate > 0.0).count();
    // The NewNote frame already raises the gate.
    assert_eq!(gated, expected + 1);
}

#[test]
fn test_mono_input_writes_mono_wav() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("Mono");
    let (mut system, mut controller) =
        test_system(test_settings(&root, OutputFormat::WavOnly, 60, 60));
    system.start_record().unwrap();

    run_capture(&mut controller, &mut Instrument::mono(), MAX_FRAMES);
    system.shutdown();

    let wavs = files_with_extension(&root.join("wav"), "wav");
    assert_eq!(wavs.len(), 1);
    assert_patched_sizes(&wavs[0]);
    let reader = hound::WavReader::open(&wavs[0]).unwrap();
    assert_eq!(reader.spec().channels, 1);
}

#[test]
fn test_loop_release_writes_sampler_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("Pad");
    let mut settings = test_settings(&root, OutputFormat::Sfz, 60, 60);
    settings.release_mode = ReleaseMode::Loop10;

    let (mut system, mut controller) = test_system(settings);
    system.start_record().unwrap();
    let timeline = run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    assert!(timeline
        .iter()
        .any(|f| f.state == CaptureState::ReleaseRecord));
    assert!(timeline
        .iter()
        .all(|f| f.state != CaptureState::GateReleaseFade));
    system.shutdown();

    let wav = root.join("wav").join("sample_note_60_vel_91_rr_0.wav");
    let wavs = files_with_extension(&root.join("wav"), "wav");
    assert_eq!(wavs, vec![wav.clone()]);

    let bytes = std::fs::read(&wav).unwrap();
    let (_, size) = find_chunk(&bytes, b"smpl").expect("no smpl chunk");
    assert_eq!(size, 60);
    assert_patched_sizes(&wav);

    let sfz = std::fs::read_to_string(root.join("Pad.sfz")).unwrap();
    assert!(sfz.contains("loop_mode=loop_sustain"), "{}", sfz);
}

#[test]
fn test_gate_only_release_skips_silence_wait() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = test_settings(&dir.path().join("Gate"), OutputFormat::WavOnly, 60, 60);
    settings.release_mode = ReleaseMode::GateOnly;
    let (system, mut controller) = test_system(settings);
    system.start_test().unwrap();

    let timeline = run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    assert!(timeline
        .iter()
        .any(|f| f.state == CaptureState::GateReleaseFade));
    assert!(timeline
        .iter()
        .all(|f| f.state != CaptureState::ReleaseRecord));
}

// =============================================================================
// Stop / Test Mode / Restart
// =============================================================================

#[test]
fn test_stop_during_gated_record() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("Strings");
    let (mut system, mut controller) =
        test_system(test_settings(&root, OutputFormat::DecentSampler, 60, 62));
    system.start_record().unwrap();

    let handle = system.handle();
    let timeline = run_until(
        &mut controller,
        &mut Instrument::new(),
        MAX_FRAMES,
        |frame| frame.state == CaptureState::GatedRecord && handle.current_job() == Some(1),
    );
    assert_eq!(timeline.last().map(|f| f.state), Some(CaptureState::GatedRecord));

    system.stop_immediately();
    let cv = controller.process(TEST_SAMPLE_RATE, &FrameInput::stereo(0.0, 0.0));
    assert_eq!(controller.state(), CaptureState::Inactive);
    assert_eq!(cv, CvOutputs::default());
    assert_eq!(system.current_job(), None);
    assert_eq!(system.status(StatusSlot::Mode), StatusLine::Idle);

    system.shutdown();

    // The first note was closed normally, the second one on abort.
    let wavs = files_with_extension(&root.join("wav"), "wav");
    assert_eq!(wavs.len(), 2);
    for wav in &wavs {
        assert_patched_sizes(wav);
    }

    let preset = std::fs::read_to_string(root.join("Strings.dspreset")).unwrap();
    assert_eq!(preset.matches("<sample ").count(), 1);
    assert!(!preset.contains("</DecentSampler>"));

    let messages: Vec<String> = system
        .poll_messages()
        .iter()
        .map(|m| m.to_string())
        .collect();
    assert!(messages.contains(&MessageBody::Stopping.to_string()));
    assert!(messages.contains(&"Render aborted; MultiFile left unfinalized".to_string()));
    assert!(!messages.contains(&"END RENDER".to_string()));
}

#[test]
fn test_test_mode_matches_record_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let record_root = dir.path().join("Record");
    let test_root = dir.path().join("Test");
    let mut record_settings = test_settings(&record_root, OutputFormat::Sfz, 58, 62);
    record_settings.planner.round_robins = 2;
    let mut test_settings = record_settings.clone();
    test_settings.output_dir = Some(test_root.clone());

    let (mut record, mut record_controller) = helpers::test_system(record_settings);
    let (mut test, mut test_controller) = helpers::test_system(test_settings);
    record.start_record().unwrap();
    test.start_test().unwrap();

    let recorded = run_capture(&mut record_controller, &mut Instrument::new(), MAX_FRAMES);
    let tested = run_capture(&mut test_controller, &mut Instrument::new(), MAX_FRAMES);
    record.shutdown();
    test.shutdown();

    assert_eq!(recorded.len(), tested.len());
    assert!(recorded == tested, "CV timelines differ");

    assert!(!test_root.exists(), "test mode created {}", test_root.display());
    assert_eq!(test.metrics().files_written, 0);
    assert_eq!(files_with_extension(&record_root.join("wav"), "wav").len(), 10);

    let test_messages: Vec<String> = test.poll_messages().iter().map(|m| m.to_string()).collect();
    assert!(test_messages.contains(&"Starting render in Test Mode".to_string()));
    assert!(test_messages.contains(&"Generated render jobs: 10 renders".to_string()));
}

#[test]
fn test_status_progress_counts_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let (system, mut controller) =
        test_system(test_settings(&dir.path().join("S"), OutputFormat::WavOnly, 60, 62));
    system.start_test().unwrap();

    controller.process(TEST_SAMPLE_RATE, &FrameInput::stereo(0.0, 0.0));
    assert_eq!(system.status(StatusSlot::Mode), StatusLine::Testing);
    run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);

    let progress: Vec<String> = system
        .status_history(StatusSlot::Progress)
        .iter()
        .map(|line| line.to_string())
        .collect();
    assert!(progress.contains(&"Start".to_string()), "{:?}", progress);
    assert!(progress.contains(&"1/3 C4 (60)".to_string()), "{:?}", progress);
    assert!(progress.contains(&"3/3 D4 (62)".to_string()), "{:?}", progress);
    assert_eq!(system.status(StatusSlot::Progress), StatusLine::Blank);
    assert_eq!(system.status(StatusSlot::Mode), StatusLine::Idle);
}

#[test]
fn test_go_trigger_restarts_last_run() {
    let dir = tempfile::tempdir().unwrap();
    let (system, mut controller) =
        test_system(test_settings(&dir.path().join("Go"), OutputFormat::WavOnly, 60, 60));
    system.start_test().unwrap();
    run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    assert!(!system.is_active());

    let go = FrameInput {
        go: 10.0,
        ..FrameInput::stereo(0.0, 0.0)
    };
    controller.process(TEST_SAMPLE_RATE, &go);
    assert!(system.is_active());
    run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);

    let starts = system
        .poll_messages()
        .iter()
        .filter(|m| m.body == MessageBody::RenderStarting { test_mode: true })
        .count();
    assert_eq!(starts, 2);
}

#[test]
fn test_start_is_rejected_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let (system, mut controller) =
        test_system(test_settings(&dir.path().join("Busy"), OutputFormat::WavOnly, 60, 61));
    system.start_test().unwrap();
    controller.process(TEST_SAMPLE_RATE, &FrameInput::stereo(0.0, 0.0));

    assert!(matches!(system.start_record(), Err(autosample::Error::Busy(_))));
    run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    assert!(system.start_record().is_ok());
}

// =============================================================================
// Planning
// =============================================================================

#[test]
fn test_sweep_48_to_72_step_4() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("Sweep");
    let mut settings = test_settings(&root, OutputFormat::Sfz, 48, 72);
    settings.planner.midi_step = 4;

    let (mut system, mut controller) = test_system(settings);
    assert_eq!(system.plan_preview().len(), 7);

    let session = system.start_record().unwrap();
    assert_eq!(session.len(), 7);
    run_capture(&mut controller, &mut Instrument::new(), MAX_FRAMES);
    system.shutdown();

    assert_eq!(files_with_extension(&root.join("wav"), "wav").len(), 7);
    let sfz = std::fs::read_to_string(root.join("Sweep.sfz")).unwrap();
    let regions: Vec<&str> = sfz.lines().filter(|l| l.starts_with("<region>")).collect();
    assert_eq!(regions.len(), 7);
    assert!(regions[0].contains("lokey=48"), "{}", regions[0]);
    assert!(regions[6].contains("hikey=72"), "{}", regions[6]);
}

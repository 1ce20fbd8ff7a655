/// Integration tests for editing sessions
mod common;

use common::{config, entries, frame_count, ramp_wav, read_int_samples};
use tuneshift_audio::{ErrorKind, Operation, Session};

#[test]
fn edit_undo_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let source = ramp_wav(dir.path(), "song.wav", 2, 10_000);
    let workdir = dir.path().join("work");

    let mut session = Session::open(&source, &workdir, config(dir.path())).unwrap();
    session.apply(Operation::tempo("2")).unwrap();
    session.apply(Operation::Reverse).unwrap();
    assert_eq!(entries(&workdir), vec!["step-000.wav", "step-001.wav", "step-002.wav"]);

    let name = session.suggested_file_name("wav");
    assert_eq!(name, "song_tempo_2_reverse.wav");
    let exported = dir.path().join(&name);
    session.export(&exported).unwrap();
    assert_eq!(frame_count(&exported), 5_000);

    // Undo both edits: the working copy matches the source again
    assert_eq!(session.undo(), Some(Operation::Reverse));
    assert_eq!(session.undo(), Some(Operation::tempo("2")));
    assert_eq!(session.undo(), None);
    assert_eq!(entries(&workdir), vec!["step-000.wav"]);
    assert_eq!(read_int_samples(session.current_file()).1, read_int_samples(&source).1);
}

#[test]
fn working_files_are_never_reused() {
    let dir = tempfile::tempdir().unwrap();
    let source = ramp_wav(dir.path(), "song.wav", 1, 1_000);
    let mut session = Session::open(&source, dir.path().join("work"), config(dir.path())).unwrap();

    session.apply(Operation::Reverse).unwrap();
    session.undo();
    session.apply(Operation::pitch("100")).unwrap();

    assert!(session.current_file().ends_with("step-002.wav"));
    assert_eq!(session.history(), vec!["pitch: 100", "load: song.wav"]);
}

#[test]
fn open_fails_for_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let err = Session::open(
        dir.path().join("missing.ogg"),
        dir.path().join("work"),
        config(dir.path()),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CannotOpenInput);
}

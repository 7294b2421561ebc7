use super::*;

#[test]
fn explicit_missing_path_is_executable_not_found() {
    let missing = std::env::temp_dir()
        .join("framepipe_missing_dir")
        .join("ffmpeg-does-not-exist");
    let err = locate_encoder(Some(&missing)).unwrap_err();
    match err {
        FramepipeError::ExecutableNotFound { searched } => assert_eq!(searched, vec![missing]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn explicit_existing_file_is_used_as_is() {
    let dir = std::env::temp_dir().join(format!("framepipe_locate_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let exe = dir.join("my-encoder");
    std::fs::write(&exe, b"").unwrap();

    assert_eq!(locate_encoder(Some(&exe)).unwrap(), exe);
}

#[test]
fn relative_existing_file_resolves_against_current_dir() {
    let cwd = std::env::current_dir().unwrap();

    // A bare name must not be handed to the child as-is, or it would be searched on PATH.
    let bare = locate_encoder(Some(Path::new("Cargo.toml"))).unwrap();
    assert!(bare.is_absolute());
    assert_eq!(bare, cwd.join("Cargo.toml"));

    let nested = locate_encoder(Some(&Path::new("src").join("lib.rs"))).unwrap();
    assert_eq!(nested, cwd.join("src").join("lib.rs"));
}

#[test]
fn unknown_bare_name_searches_path() {
    let err = locate_encoder(Some(Path::new("framepipe-no-such-encoder-binary"))).unwrap_err();
    match err {
        FramepipeError::ExecutableNotFound { searched } => {
            assert!(
                searched
                    .iter()
                    .all(|p| p.ends_with("framepipe-no-such-encoder-binary"))
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn ensure_parent_dir_creates_nested_dirs() {
    let root = std::env::temp_dir().join(format!("framepipe_parent_{}", std::process::id()));
    let out = root.join("a").join("b").join("out.mp4");
    ensure_parent_dir(&out).unwrap();
    assert!(root.join("a").join("b").is_dir());

    ensure_parent_dir(Path::new("bare.mp4")).unwrap();
}

#[cfg(unix)]
#[test]
fn finish_returns_stderr_and_exit_status() {
    let args = vec![
        "-c".to_owned(),
        "cat > /dev/null; echo 'bad frame' >&2; exit 3".to_owned(),
    ];
    let mut proc = FfmpegProcess::spawn(Path::new("/bin/sh"), &args).unwrap();
    {
        use std::io::Write as _;
        let mut input = proc.take_input().unwrap();
        input.write_all(&[0u8; 16]).unwrap();
    }
    assert!(proc.take_input().is_err());

    let diagnostics = proc.finish().unwrap();
    assert!(diagnostics.contains("bad frame"));
    assert!(diagnostics.contains("encoder exited with"));
}

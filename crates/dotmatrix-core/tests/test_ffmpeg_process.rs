//! `FfmpegSource` and `FfmpegSink` driven against shell stand-ins for
//! `ffprobe` and `ffmpeg`, so no real ffmpeg install is needed.
#![cfg(unix)]

mod common;

use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use dotmatrix_core::error::DotMatrixError;
use dotmatrix_core::io::ffmpeg::{FfmpegSink, FfmpegSource};
use dotmatrix_core::io::{FrameSink, FrameSource, SinkSpec};

use common::{uniform_gray, uniform_rgb};

/// PATH is process-wide; tests that swap it take this lock.
static PATH_LOCK: Mutex<()> = Mutex::new(());

const GUARD_TIMEOUT: Duration = Duration::from_secs(20);

/// Writes ~200 KB of decoder noise to stderr, well past a pipe buffer.
const STDERR_FLOOD: &str = r#"i=0
while [ $i -lt 4000 ]; do
  echo "[h264 @ 0x55d0] error while decoding MB 12 7, bytestream -5" >&2
  i=$((i+1))
done
"#;

/// A directory of stub tools prepended to PATH for the lifetime of the value.
struct StubTools {
    dir: TempDir,
    old_path: Option<OsString>,
    _lock: MutexGuard<'static, ()>,
}

impl StubTools {
    /// `ffmpeg_body` is the shell body run for every non `-version` call.
    fn install(probe_width: u32, probe_height: u32, ffmpeg_body: &str) -> Self {
        let lock = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();

        let probe_json = format!(
            r#"{{"streams":[{{"codec_type":"video","width":{probe_width},"height":{probe_height},"avg_frame_rate":"30/1","nb_frames":"2"}}],"format":{{}}}}"#
        );
        write_script(
            dir.path(),
            "ffprobe",
            &format!("cat <<'EOF'\n{probe_json}\nEOF\n"),
        );
        write_script(
            dir.path(),
            "ffmpeg",
            &format!("if [ \"$1\" = \"-version\" ]; then exit 0; fi\n{ffmpeg_body}"),
        );

        let old_path = std::env::var_os("PATH");
        let mut paths = vec![dir.path().to_path_buf()];
        if let Some(old) = &old_path {
            paths.extend(std::env::split_paths(old));
        }
        std::env::set_var("PATH", std::env::join_paths(paths).unwrap());

        Self {
            dir,
            old_path,
            _lock: lock,
        }
    }

    fn input(&self) -> PathBuf {
        let path = self.dir.path().join("clip.mp4");
        fs::write(&path, b"not really a video").unwrap();
        path
    }
}

impl Drop for StubTools {
    fn drop(&mut self) {
        match &self.old_path {
            Some(old) => std::env::set_var("PATH", old),
            None => std::env::remove_var("PATH"),
        }
    }
}

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Run `f` on a worker thread and fail instead of hanging the suite.
fn within_timeout<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(GUARD_TIMEOUT)
        .expect("ffmpeg call did not return in time")
}

fn read_all(source: &mut FfmpegSource) -> Result<usize, DotMatrixError> {
    let mut count = 0;
    while source.read_next()?.is_some() {
        count += 1;
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[test]
fn test_source_reads_every_frame() {
    // 2x2 rgb24 = 12 bytes per frame, two frames.
    let tools = StubTools::install(2, 2, "head -c 24 /dev/zero\n");
    let mut source = FfmpegSource::open(&tools.input()).unwrap();
    assert_eq!(source.descriptor().width, 2);
    assert_eq!(source.descriptor().total_frames, Some(2));

    let first = source.read_next().unwrap().unwrap();
    assert_eq!((first.width(), first.height(), first.channels()), (2, 2, 3));
    assert_eq!(first.metadata.frame_index, 0);
    let second = source.read_next().unwrap().unwrap();
    assert_eq!(second.metadata.frame_index, 1);
    assert!(source.read_next().unwrap().is_none());
    // End of stream is sticky.
    assert!(source.read_next().unwrap().is_none());

    source.release().unwrap();
    source.release().unwrap();
    assert!(source.read_next().is_err());
}

#[test]
fn test_source_truncated_frame_is_decode_error() {
    let tools = StubTools::install(2, 2, "head -c 18 /dev/zero\n");
    let mut source = FfmpegSource::open(&tools.input()).unwrap();

    assert!(source.read_next().unwrap().is_some());
    match source.read_next() {
        Err(DotMatrixError::Decode(msg)) => assert!(msg.contains("truncated frame 1"), "{msg}"),
        other => panic!("expected Decode, got {other:?}"),
    }
    source.release().unwrap();
}

#[test]
fn test_source_decoder_failure_carries_diagnostics() {
    let tools = StubTools::install(2, 2, "echo 'moov atom not found' >&2\nexit 1\n");
    let mut source = FfmpegSource::open(&tools.input()).unwrap();

    match source.read_next() {
        Err(DotMatrixError::Decode(msg)) => assert!(msg.contains("moov atom not found"), "{msg}"),
        other => panic!("expected Decode, got {other:?}"),
    }
}

#[test]
fn test_source_survives_stderr_flood() {
    let body = format!("{STDERR_FLOOD}head -c 24 /dev/zero\n");
    let tools = StubTools::install(2, 2, &body);
    let input = tools.input();

    let frames = within_timeout(move || {
        let mut source = FfmpegSource::open(&input)?;
        let count = read_all(&mut source)?;
        source.release()?;
        Ok::<_, DotMatrixError>(count)
    });
    assert_eq!(frames.unwrap(), 2);
}

#[test]
fn test_source_flood_error_keeps_only_the_tail() {
    let body = format!("{STDERR_FLOOD}echo 'Invalid data found when processing input' >&2\nexit 1\n");
    let tools = StubTools::install(2, 2, &body);
    let input = tools.input();

    let result = within_timeout(move || FfmpegSource::open(&input)?.read_next());
    match result {
        Err(DotMatrixError::Decode(msg)) => {
            assert!(msg.ends_with("Invalid data found when processing input"), "{msg}");
            assert!(msg.len() < 20 * 1024, "message is {} bytes", msg.len());
        }
        other => panic!("expected Decode, got {other:?}"),
    }
}

#[test]
fn test_source_early_release_stops_running_decoder() {
    let tools = StubTools::install(2, 2, "head -c 12 /dev/zero\nexec sleep 30\n");
    let mut source = FfmpegSource::open(&tools.input()).unwrap();
    assert!(source.read_next().unwrap().is_some());

    let started = Instant::now();
    source.release().unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(source.read_next().is_err());
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Copies stdin to the last argument, the way ffmpeg writes its output file.
const COPY_TO_OUTPUT: &str = "for a; do last=$a; done\ncat > \"$last\"\n";

#[test]
fn test_sink_writes_frames_and_flushes_on_release() {
    let tools = StubTools::install(2, 2, COPY_TO_OUTPUT);
    let out = tools.dir.path().join("out").join("clip.temp.mkv");
    let spec = SinkSpec {
        width: 2,
        height: 2,
        fps: 15.0,
    };

    let mut sink = FfmpegSink::create(&out, &spec).unwrap();
    sink.write(&uniform_rgb(2, 2, [10, 20, 30])).unwrap();
    // Gray frames are widened to rgb24.
    sink.write(&uniform_gray(2, 2, 200)).unwrap();
    sink.release().unwrap();
    sink.release().unwrap();

    let bytes = fs::read(&out).unwrap();
    assert_eq!(bytes.len(), 24);
    assert_eq!(&bytes[..3], &[10, 20, 30]);
    assert_eq!(&bytes[12..15], &[200, 200, 200]);
}

#[test]
fn test_sink_rejects_wrong_frame_size() {
    let tools = StubTools::install(2, 2, COPY_TO_OUTPUT);
    let out = tools.dir.path().join("clip.temp.mkv");
    let spec = SinkSpec {
        width: 2,
        height: 2,
        fps: 15.0,
    };
    let mut sink = FfmpegSink::create(&out, &spec).unwrap();
    assert!(matches!(
        sink.write(&uniform_rgb(4, 2, [0, 0, 0])),
        Err(DotMatrixError::Encode(_))
    ));
    sink.release().unwrap();
}

#[test]
fn test_sink_encoder_failure_carries_diagnostics() {
    let tools = StubTools::install(2, 2, "cat > /dev/null\necho 'Unknown encoder ffv1' >&2\nexit 1\n");
    let out = tools.dir.path().join("clip.temp.mkv");
    let spec = SinkSpec {
        width: 2,
        height: 2,
        fps: 15.0,
    };
    let mut sink = FfmpegSink::create(&out, &spec).unwrap();
    sink.write(&uniform_rgb(2, 2, [1, 2, 3])).unwrap();
    match sink.release() {
        Err(DotMatrixError::Encode(msg)) => assert!(msg.contains("Unknown encoder ffv1"), "{msg}"),
        other => panic!("expected Encode, got {other:?}"),
    }
}

#[test]
fn test_sink_survives_stderr_flood() {
    // 128x128 rgb24 frames; four of them overflow the stdin pipe while the
    // encoder is still busy writing diagnostics.
    let body = format!("{STDERR_FLOOD}{COPY_TO_OUTPUT}");
    let tools = StubTools::install(2, 2, &body);
    let out = tools.dir.path().join("clip.temp.mkv");
    let spec = SinkSpec {
        width: 128,
        height: 128,
        fps: 15.0,
    };

    let written = out.clone();
    let result = within_timeout(move || {
        let mut sink = FfmpegSink::create(&written, &spec)?;
        for v in 0..4u8 {
            sink.write(&uniform_rgb(128, 128, [v, v, v]))?;
        }
        sink.release()
    });
    result.unwrap();
    assert_eq!(fs::metadata(&out).unwrap().len(), 4 * 128 * 128 * 3);
}

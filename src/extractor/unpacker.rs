use crate::config::{Compression, ExtractConfig};
use crate::error::{ExtractError, Result};
use crate::scanner::{ShardArchive, ShardScanner};
use crate::ui::GracefulShutdown;
use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::thread;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Unpacks a single shard and reports how much of it has been consumed.
pub trait ShardUnpacker: Send + Sync {
    /// Fails when the unpacker cannot run at all. Checked once before any
    /// shard is attempted.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Extracts `shard` from `source_dir` into `dest_dir`, overwriting
    /// existing files. `progress` receives non-decreasing fractions in
    /// `[0.0, 1.0]`.
    fn unpack(
        &self,
        shard: u32,
        source_dir: &Path,
        dest_dir: &Path,
        progress: &mut dyn FnMut(f64),
    ) -> Result<()>;
}

/// Resolves `program` the way a shell would.
pub fn locate_tool(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|e| {
        tracing::debug!(program, error = %e, "tool lookup failed");
        ExtractError::ToolNotFound {
            program: program.to_string(),
        }
    })
}

/// Streams a shard's chunks through the system `tar`.
pub struct NativeTar {
    program: String,
    compression: Compression,
    scanner: ShardScanner,
    shutdown: GracefulShutdown,
}

impl NativeTar {
    pub fn new(config: &ExtractConfig, shutdown: GracefulShutdown) -> Result<Self> {
        Ok(Self {
            program: config.tar_program.clone(),
            compression: config.compression,
            scanner: ShardScanner::new(config)?,
            shutdown,
        })
    }

    fn command(&self, dest_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-x");
        if let Some(flag) = self.compression.tar_flag() {
            command.arg(flag);
        }
        command
            .arg("-f")
            .arg("-")
            .arg("-C")
            .arg(dest_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }

    fn feed_chunks(
        &self,
        archive: &ShardArchive,
        mut stdin: ChildStdin,
        progress: &mut dyn FnMut(f64),
    ) -> Result<()> {
        let total = archive.total_bytes();
        let mut written = 0u64;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        for chunk in &archive.chunks {
            tracing::trace!(shard = archive.shard, chunk = %chunk.filename, "feeding chunk");
            let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, fs::File::open(&chunk.path)?);

            loop {
                self.shutdown.check_shutdown()?;

                let bytes_read = reader.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }

                stdin.write_all(&buffer[..bytes_read])?;
                written += bytes_read as u64;

                if total > 0 {
                    progress(written as f64 / total as f64);
                }
            }
        }

        stdin.flush()?;
        Ok(())
    }
}

impl ShardUnpacker for NativeTar {
    fn check_available(&self) -> Result<()> {
        locate_tool(&self.program).map(|path| {
            tracing::debug!(path = %path.display(), "using tar");
        })
    }

    fn unpack(
        &self,
        shard: u32,
        source_dir: &Path,
        dest_dir: &Path,
        progress: &mut dyn FnMut(f64),
    ) -> Result<()> {
        let archive = self.scanner.scan_shard(source_dir, shard)?;
        tracing::debug!("{}", archive.display_summary());

        fs::create_dir_all(dest_dir)?;

        let mut child = self.command(dest_dir).spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| {
            ExtractError::Io(io::Error::other("tar stdin was not captured"))
        })?;
        let stderr = child.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut captured = Vec::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_end(&mut captured) {
                    tracing::debug!(error = %e, "reading tar stderr failed");
                }
            }
            // tar echoes member names, which need not be UTF-8
            String::from_utf8_lossy(&captured).into_owned()
        });

        let fed = self.feed_chunks(&archive, stdin, progress);
        if matches!(fed, Err(ExtractError::Cancelled)) {
            let _ = child.kill();
        }

        let status = child.wait()?;
        let stderr = stderr_reader.join().unwrap_or_default();

        match fed {
            // tar closing its input early is reported through its exit status
            Err(ExtractError::Io(ref e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Err(e) => return Err(e),
            Ok(()) => {}
        }

        if !status.success() {
            return Err(ExtractError::ToolFailed {
                shard,
                code: status.code(),
                stderr: last_line(&stderr),
            });
        }

        Ok(())
    }
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
        .unwrap_or("no diagnostic output")
        .to_string()
}

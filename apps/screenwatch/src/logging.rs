use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;

struct DailyFile {
    day: String,
    file: Option<File>,
}

/// Appends log lines to `<dir>/screenwatch_YYYYMMDD.log`, switching files when the local date changes.
#[derive(Clone)]
pub struct DailyFileMakeWriter {
    dir: PathBuf,
    current: Arc<Mutex<DailyFile>>,
}

impl DailyFileMakeWriter {
    pub fn new(dir: &Path) -> Result<Self, String> {
        fs::create_dir_all(dir)
            .map_err(|err| format!("failed to create log dir {}: {}", dir.display(), err))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            current: Arc::new(Mutex::new(DailyFile {
                day: String::new(),
                file: None,
            })),
        })
    }

    pub fn path_for_day(&self, day: &str) -> PathBuf {
        self.dir.join(format!("screenwatch_{day}.log"))
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let today = Local::now().format("%Y%m%d").to_string();
        let mut current = self.current.lock();
        if current.day != today || current.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for_day(&today))?;
            current.day = today;
            current.file = Some(file);
        }
        match current.file.as_mut() {
            Some(file) => writeln!(file, "{line}"),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DailyFileMakeWriter {
    type Writer = DailyFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DailyFileWriter {
            target: self.clone(),
            partial: String::new(),
        }
    }
}

pub struct DailyFileWriter {
    target: DailyFileMakeWriter,
    partial: String,
}

impl Write for DailyFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let chunk = String::from_utf8_lossy(buf);
        self.partial.push_str(&chunk);
        while let Some(idx) = self.partial.find('\n') {
            let line = self.partial[..idx].trim_end_matches('\r').to_string();
            self.partial.drain(..=idx);
            if !line.is_empty() {
                self.target.write_line(&line)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for DailyFileWriter {
    fn drop(&mut self) {
        let line = self.partial.trim().to_string();
        if !line.is_empty() {
            let _ = self.target.write_line(&line);
        }
    }
}

pub fn init_tracing(level: &str, format: &str, log_dir: &Path) -> Result<(), String> {
    let filter = std::env::var("SCREENWATCH_LOG").unwrap_or_else(|_| level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;
    let writer = io::stdout.and(DailyFileMakeWriter::new(log_dir)?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(writer);
    match format {
        "json" => builder.json().init(),
        "text" => builder.init(),
        other => return Err(format!("unsupported log format: {other} (expected text|json)")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::DailyFileMakeWriter;
    use chrono::Local;
    use std::fs;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn writes_complete_lines_to_todays_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let make_writer = DailyFileMakeWriter::new(&dir.path().join("logs")).expect("writer");
        {
            let mut writer = make_writer.make_writer();
            writer.write_all(b"first line\nsecond ").expect("write");
            writer.write_all(b"line\n\ntrailing").expect("write");
        }

        let today = Local::now().format("%Y%m%d").to_string();
        let contents =
            fs::read_to_string(make_writer.path_for_day(&today)).expect("log file");
        assert_eq!(contents, "first line\nsecond line\ntrailing\n");
    }
}

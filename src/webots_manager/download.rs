//! Opening an archive location as a byte stream.
//!
//! HTTP transfers with a known length run a producer/consumer pair: the
//! reading side forwards byte counts over a channel to a reporter thread
//! that renders a progress line on stderr. Closing the channel (dropping or
//! finishing the reader) tells the reporter to print its final line and exit.
//! Everything else about the download is sequential.

use crate::error::Result;
use console::Term;
use std::fs::File;
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

const BAR_WIDTH: u64 = 40;

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Opens `location` for reading: an http(s) URL or a local file path.
pub fn open(location: &str) -> Result<Box<dyn Read>> {
    if !is_remote(location) {
        return Ok(Box::new(File::open(location)?));
    }

    tracing::info!("downloading {}", location);
    let response = reqwest::blocking::get(location)?.error_for_status()?;
    match response.content_length() {
        Some(total) => Ok(Box::new(ProgressReader::new(
            response,
            total,
            location.to_string(),
        ))),
        None => Ok(Box::new(response)),
    }
}

/// Reader wrapper reporting every chunk read to a progress thread.
pub struct ProgressReader<R> {
    inner: R,
    progress: Option<Sender<u64>>,
    reporter: Option<JoinHandle<u64>>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, total: u64, label: String) -> Self {
        let (tx, rx) = mpsc::channel();
        let reporter = thread::spawn(move || report(rx, total, &label, &Term::stderr()));
        Self {
            inner,
            progress: Some(tx),
            reporter: Some(reporter),
        }
    }

    /// Closes the progress channel and waits for the reporter. Returns the
    /// number of bytes it was told about.
    pub fn finish(mut self) -> u64 {
        self.close()
    }

    fn close(&mut self) -> u64 {
        self.progress.take();
        self.reporter
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or(0)
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            if let Some(tx) = &self.progress {
                // A reporter that went away only costs us the display.
                let _ = tx.send(n as u64);
            }
        }
        Ok(n)
    }
}

impl<R> Drop for ProgressReader<R> {
    fn drop(&mut self) {
        self.progress.take();
        if let Some(handle) = self.reporter.take() {
            let _ = handle.join();
        }
    }
}

fn report(rx: Receiver<u64>, total: u64, label: &str, term: &Term) -> u64 {
    let interactive = term.is_term();
    let mut done: u64 = 0;
    let mut last_percent = u64::MAX;

    for n in rx {
        done += n;
        if !interactive {
            continue;
        }
        let percent = if total == 0 { 100 } else { (done * 100 / total).min(100) };
        if percent != last_percent {
            last_percent = percent;
            let filled = percent * BAR_WIDTH / 100;
            let bar = format!(
                "[{}>{}] {:>3}%",
                "=".repeat(filled as usize),
                " ".repeat((BAR_WIDTH - filled) as usize),
                percent
            );
            let _ = term.clear_line();
            let _ = term.write_str(&bar);
        }
    }

    if interactive {
        let _ = term.clear_line();
        let _ = term.write_line(&format!("Downloaded {} ({} bytes)", label, done));
    }
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.org/a.tar.bz2"));
        assert!(is_remote("http://example.org/a.tar.bz2"));
        assert!(!is_remote("/srv/mirror/a.tar.bz2"));
    }

    #[test]
    fn test_progress_reader_passes_data_and_counts_bytes() {
        let data = vec![7u8; 100_000];
        let mut reader = ProgressReader::new(Cursor::new(data.clone()), 100_000, "t".into());

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(reader.finish(), 100_000);
    }

    #[test]
    fn test_dropping_reader_terminates_reporter() {
        let reader = ProgressReader::new(Cursor::new(vec![1u8; 10]), 10, "t".into());
        // Drop joins the reporter thread; a hang here would fail the test run.
        drop(reader);
    }

    #[test]
    fn test_open_local_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("a.tar");
        std::fs::write(&path, b"abc").unwrap();

        let mut content = String::new();
        open(path.to_str().unwrap())
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "abc");
    }
}

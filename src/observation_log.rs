//! Observation log
//!
//! Append-only CSV store of sampled observations. Column names and order are
//! the durable contract for downstream reporting tools, so they never change.
//!
//! Each append encodes one row in memory and writes it to the end of the file
//! with a single write; the file is never rewritten.

use crate::error::SenseError;
use crate::types::Observation;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persisted columns, in order
pub const COLUMNS: [&str; 7] = [
    "waktu",
    "ekspresi",
    "skor_ekspresi",
    "rambut",
    "skor_rambut",
    "total_skor",
    "status",
];

/// Default log location, relative to the working directory
pub const DEFAULT_LOG_PATH: &str = "logs/results.csv";

/// Handle to the observation log file.
///
/// Assumes a single writer. Share it across threads only behind external
/// serialization such as a mutex.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    path: PathBuf,
}

impl ObservationLog {
    /// Create a handle; no I/O happens until `init`, `append` or `read_all`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty log with the header row if none exists.
    ///
    /// Returns `true` when the file was created. An existing file is left
    /// untouched.
    pub fn init(&self) -> Result<bool, SenseError> {
        self.ensure_parent_dir()?;

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                file.write_all(&header_bytes()?)?;
                file.sync_all()?;
                info!(path = %self.path.display(), "created observation log");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "observation log already exists");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append one observation.
    ///
    /// Either the whole row is written and synced, or the file is truncated
    /// back to its previous length and the error returned.
    pub fn append(&self, observation: &Observation) -> Result<(), SenseError> {
        if !observation.is_consistent() {
            return Err(SenseError::InvalidObservation(format!(
                "total {} / status {} do not match sub-scores {} + {}",
                observation.total_skor,
                observation.status,
                observation.skor_ekspresi,
                observation.skor_rambut
            )));
        }

        self.ensure_parent_dir()?;

        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)?;
        let previous_len = file.metadata()?.len();

        let mut bytes = Vec::new();
        if previous_len == 0 {
            // A missing or zero-length store gets its header in the same write
            bytes.extend(header_bytes()?);
        } else {
            read_header(&mut file).and_then(|headers| check_schema(&headers))?;
            if !ends_with_newline(&mut file)? {
                bytes.push(b'\n');
            }
        }
        bytes.extend(row_bytes(observation)?);

        write_or_rollback(&mut file, &bytes, previous_len).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "append failed, rolled back");
            SenseError::from(e)
        })
    }

    /// Read every observation in insertion order.
    ///
    /// A missing or empty file reads as an empty log.
    pub fn read_all(&self) -> Result<Vec<Observation>, SenseError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(BufReader::new(file));

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        check_schema(&headers)?;

        let mut observations = Vec::new();
        for (index, result) in reader.deserialize::<Observation>().enumerate() {
            let row = index + 1;
            let observation = result.map_err(|e| SenseError::CorruptRecord {
                row,
                reason: e.to_string(),
            })?;
            if !observation.is_consistent() {
                return Err(SenseError::CorruptRecord {
                    row,
                    reason: "total score or status does not match sub-scores".to_string(),
                });
            }
            observations.push(observation);
        }

        Ok(observations)
    }

    fn ensure_parent_dir(&self) -> Result<(), SenseError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Fail unless the header row is exactly the persisted schema
pub fn check_schema(headers: &csv::StringRecord) -> Result<(), SenseError> {
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if found != COLUMNS {
        return Err(SenseError::SchemaMismatch {
            expected: COLUMNS.join(","),
            found: found.join(","),
        });
    }
    Ok(())
}

/// Append target that can be cut back to an earlier length
trait RollbackWrite: Write {
    fn sync(&mut self) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl RollbackWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write and sync `bytes`, or truncate back to `previous_len` and return the
/// write error
fn write_or_rollback<W: RollbackWrite>(
    target: &mut W,
    bytes: &[u8],
    previous_len: u64,
) -> io::Result<()> {
    if let Err(e) = target.write_all(bytes).and_then(|()| target.sync()) {
        if let Err(rollback) = target.truncate(previous_len) {
            warn!(error = %rollback, "rollback of partial append failed");
        }
        return Err(e);
    }
    Ok(())
}

fn read_header(file: &mut File) -> Result<csv::StringRecord, SenseError> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(&mut *file);
    Ok(reader.headers()?.clone())
}

fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn header_bytes() -> Result<Vec<u8>, SenseError> {
    let mut writer = csv_writer();
    writer.write_record(COLUMNS)?;
    writer
        .into_inner()
        .map_err(|e| SenseError::Io(e.into_error()))
}

fn row_bytes(observation: &Observation) -> Result<Vec<u8>, SenseError> {
    let mut writer = csv_writer();
    writer.serialize(observation)?;
    writer
        .into_inner()
        .map_err(|e| SenseError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmotionLabel, HairLabel, StressStatus};
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 14)
            .unwrap()
            .and_hms_opt(9, 15, second)
            .unwrap()
    }

    fn observation(second: u32, emotion: u32, hair: u32) -> Observation {
        let total = emotion + hair;
        Observation {
            waktu: at(second),
            ekspresi: crate::emotion::EmotionScorer::label_for(emotion),
            skor_ekspresi: emotion,
            rambut: match hair {
                0 => HairLabel::RambutRapih,
                2 => HairLabel::RambutAgakAcak,
                _ => HairLabel::RambutSangatAcak,
            },
            skor_rambut: hair,
            total_skor: total,
            status: crate::classifier::StressClassifier::status_for(total),
        }
    }

    #[test]
    fn test_init_creates_header_only_file() {
        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("logs").join("results.csv"));

        assert!(log.init().unwrap());

        let contents = fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            contents,
            "waktu,ekspresi,skor_ekspresi,rambut,skor_rambut,total_skor,status\n"
        );
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("results.csv"));

        assert!(log.init().unwrap());
        log.append(&observation(1, 11, 0)).unwrap();
        let before = fs::read_to_string(log.path()).unwrap();

        assert!(!log.init().unwrap());
        assert_eq!(fs::read_to_string(log.path()).unwrap(), before);
    }

    #[test]
    fn test_append_then_read_preserves_order_and_values() {
        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("results.csv"));
        log.init().unwrap();

        let written = vec![
            observation(0, 0, 0),
            observation(1, 6, 2),
            observation(2, 11, 4),
            observation(3, 30, 0),
        ];
        for obs in &written {
            log.append(obs).unwrap();
        }

        assert_eq!(log.read_all().unwrap(), written);
    }

    #[test]
    fn test_row_format_matches_schema() {
        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("results.csv"));
        log.init().unwrap();
        log.append(&observation(5, 11, 0)).unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "2025-07-14 09:15:05,Stres Tinggi,11,Rambut Rapih,0,11,Cemas Sedang"
        );
    }

    #[test]
    fn test_append_without_init_writes_header() {
        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("nested").join("results.csv"));

        log.append(&observation(0, 4, 2)).unwrap();

        let read = log.read_all().unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].status, StressStatus::CemasRingan);
    }

    #[test]
    fn test_append_to_existing_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        File::create(&path).unwrap();
        let log = ObservationLog::new(&path);

        assert!(!log.init().unwrap());
        log.append(&observation(0, 0, 0)).unwrap();

        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("absent.csv"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_inconsistent_observation_rejected() {
        let dir = tempdir().unwrap();
        let log = ObservationLog::new(dir.path().join("results.csv"));
        log.init().unwrap();

        let mut bad = observation(0, 6, 2);
        bad.total_skor = 3;
        assert!(matches!(
            log.append(&bad),
            Err(SenseError::InvalidObservation(_))
        ));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_schema_mismatch_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, "time,label,score\n2025-07-14 09:15:00,Tenang,0\n").unwrap();

        let log = ObservationLog::new(&path);
        assert!(matches!(
            log.read_all(),
            Err(SenseError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_corrupt_row_reported_with_row_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(
            &path,
            "waktu,ekspresi,skor_ekspresi,rambut,skor_rambut,total_skor,status\n\
             2025-07-14 09:15:00,Tenang,0,Rambut Rapih,0,0,Tenang\n\
             2025-07-14 09:15:01,Tenang,zero,Rambut Rapih,0,0,Tenang\n",
        )
        .unwrap();

        let log = ObservationLog::new(&path);
        match log.read_all() {
            Err(SenseError::CorruptRecord { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }

    #[test]
    fn test_reads_rows_written_by_other_tools() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(
            &path,
            "waktu,ekspresi,skor_ekspresi,rambut,skor_rambut,total_skor,status\r\n\
             2025-07-14 09:15:00,Wajah Tidak Terdeteksi,0,Rambut Sangat Acak,4,4,Cemas Ringan\r\n",
        )
        .unwrap();

        let read = ObservationLog::new(&path).read_all().unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].ekspresi, EmotionLabel::WajahTidakTerdeteksi);
        assert_eq!(read[0].status, StressStatus::CemasRingan);
    }

    #[test]
    fn test_append_refuses_foreign_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let foreign = "time,label,score\n2025-07-14 09:15:00,Tenang,0\n";
        fs::write(&path, foreign).unwrap();

        let log = ObservationLog::new(&path);
        assert!(matches!(
            log.append(&observation(0, 11, 0)),
            Err(SenseError::SchemaMismatch { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), foreign);
    }

    #[test]
    fn test_append_after_header_without_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        fs::write(&path, COLUMNS.join(",")).unwrap();

        let log = ObservationLog::new(&path);
        log.append(&observation(5, 11, 0)).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "waktu,ekspresi,skor_ekspresi,rambut,skor_rambut,total_skor,status\n\
             2025-07-14 09:15:05,Stres Tinggi,11,Rambut Rapih,0,11,Cemas Sedang\n"
        );
        assert_eq!(log.read_all().unwrap().len(), 1);
    }

    /// In-memory target that accepts a fixed number of bytes, then fails
    struct ShortDisk {
        data: Vec<u8>,
        capacity: usize,
        fail_sync: bool,
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RollbackWrite for ShortDisk {
        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::new(io::ErrorKind::Other, "sync failed"));
            }
            Ok(())
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn test_partial_header_and_row_rolled_back() {
        let mut bytes = header_bytes().unwrap();
        bytes.extend(row_bytes(&observation(5, 11, 0)).unwrap());

        let mut disk = ShortDisk {
            data: Vec::new(),
            capacity: 20,
            fail_sync: false,
        };
        let err = write_or_rollback(&mut disk, &bytes, 0).unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert!(disk.data.is_empty());
    }

    #[test]
    fn test_failed_sync_rolled_back_to_previous_length() {
        let existing = header_bytes().unwrap();
        let previous_len = existing.len() as u64;
        let mut disk = ShortDisk {
            data: existing.clone(),
            capacity: usize::MAX,
            fail_sync: true,
        };

        let row = row_bytes(&observation(5, 11, 0)).unwrap();
        assert!(write_or_rollback(&mut disk, &row, previous_len).is_err());
        assert_eq!(disk.data, existing);
    }
}

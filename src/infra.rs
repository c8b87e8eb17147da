use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tool_rankings::AppError;

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Reads `path` when it exists, otherwise starts from `T::default()`.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, AppError> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    let mut rendered = serde_json::to_string_pretty(value)?;
    rendered.push('\n');
    Ok(rendered)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replaces several files together: every document is written beside its
/// target first and nothing is renamed into place unless all writes succeeded.
/// Renames follow `files` order.
pub fn replace_files(files: &[(&Path, String)]) -> Result<(), AppError> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
    for (path, contents) in files {
        let temp = staging_path(path);
        if let Err(err) = fs::write(&temp, contents) {
            let _ = fs::remove_file(&temp);
            for (written, _) in &staged {
                let _ = fs::remove_file(written);
            }
            return Err(err.into());
        }
        staged.push((temp, *path));
    }

    for (temp, path) in staged {
        fs::rename(&temp, path)?;
    }
    Ok(())
}

use crate::error::LayoutError;

use clap::ValueEnum;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum FileType {
    Toml,
    Json,
}

impl FileType {
    /// Guess the file type from the extension, anything but `.toml` is read as JSON.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => FileType::Toml,
            _ => FileType::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Toml => "toml",
            FileType::Json => "json",
        }
    }
}

pub fn read<T: DeserializeOwned, P: AsRef<Path>>(
    path: P,
    file_type: FileType,
) -> Result<T, LayoutError> {
    match file_type {
        FileType::Toml => {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str::<T>(&content)?)
        }
        FileType::Json => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
    }
}

pub fn write<T: Serialize, P: AsRef<Path>>(
    path: P,
    file_type: FileType,
    data: &T,
) -> Result<(), LayoutError> {
    let content = match file_type {
        FileType::Toml => toml::to_string::<T>(data)?,
        FileType::Json => serde_json::to_string_pretty::<T>(data)?,
    };
    let mut file = File::create(path)?;
    write!(file, "{}", content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read, write, FileType};
    use serde_json::json;

    #[test]
    fn ut_file_type_from_path() {
        assert_eq!(FileType::from_path("layout.toml"), FileType::Toml);
        assert_eq!(FileType::from_path("LAYOUT.TOML"), FileType::Toml);
        assert_eq!(FileType::from_path("layout.json"), FileType::Json);
        assert_eq!(FileType::from_path("layout"), FileType::Json);
    }

    #[test]
    fn ut_write_json_and_toml() {
        let dir = std::env::temp_dir().join(format!("modbus-layout-convert-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let src = dir.join("layout.json");
        let dest = dir.join("layout.toml");

        let layout = json!({
            "coils": [{ "address": 1 }],
            "holding": [{ "address": 2, "type": "float", "props": { "name": "temp" } }],
        });
        write(&src, FileType::Json, &layout).unwrap();
        let data: serde_json::Value = read(&src, FileType::Json).unwrap();
        write(&dest, FileType::Toml, &data).unwrap();

        let back: serde_json::Value = read(&dest, FileType::Toml).unwrap();
        assert_eq!(back, layout);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn ut_read_missing_file() {
        let result: Result<serde_json::Value, _> =
            read("/nonexistent/layout.json", FileType::Json);
        assert!(matches!(result, Err(crate::error::LayoutError::Io(_))));
    }
}

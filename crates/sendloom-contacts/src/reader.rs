//! CSV contact reader.

use std::path::Path;

use sendloom_core::error::{Result, SendloomError};
use sendloom_core::types::{Contact, InvalidContact};

use crate::phone;

/// Parse result: the valid contacts in source order plus the excluded rows.
#[derive(Debug)]
pub struct ContactBook {
    pub contacts: Vec<Contact>,
    pub invalid: Vec<InvalidContact>,
}

impl ContactBook {
    pub fn total_rows(&self) -> usize {
        self.contacts.len() + self.invalid.len()
    }
}

/// Read contacts from a CSV file. The header row names the fields; the phone
/// column is located tolerantly (see [`phone::is_phone_header`]). Rows
/// without a usable phone are collected into `invalid`, not errors.
pub fn read_contacts(path: &Path) -> Result<ContactBook> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| SendloomError::Contacts(format!("Failed to open {}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SendloomError::Contacts(format!("Failed to read header row: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let phone_col = headers
        .iter()
        .position(|h| phone::is_phone_header(h))
        .ok_or_else(|| {
            SendloomError::Contacts(format!(
                "No phone column found in {} (headers: {})",
                path.display(),
                headers.join(", ")
            ))
        })?;

    let mut contacts = Vec::new();
    let mut invalid = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                invalid.push(InvalidContact {
                    row,
                    reason: format!("unparseable row: {e}"),
                });
                continue;
            }
        };

        let fields: Vec<(String, String)> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();

        let raw_phone = record.get(phone_col).unwrap_or("");
        match phone::normalize(raw_phone) {
            Some(normalized) => contacts.push(Contact::new(normalized, fields)),
            None => invalid.push(InvalidContact {
                row,
                reason: format!("invalid phone: {raw_phone:?}"),
            }),
        }
    }

    tracing::info!(
        "Contacts loaded: {} valid, {} invalid from {}",
        contacts.len(),
        invalid.len(),
        path.display()
    );
    Ok(ContactBook { contacts, invalid })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("sendloom-test-contacts");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reads_valid_rows_in_order() {
        let path = write_csv(
            "basic.csv",
            "name,Phone Number,city\nAda,+1 415 555 0100,London\nGrace,+1 415 555 0101,NYC\n",
        );
        let book = read_contacts(&path).unwrap();
        assert_eq!(book.contacts.len(), 2);
        assert!(book.invalid.is_empty());
        assert_eq!(book.contacts[0].phone, "+14155550100");
        assert_eq!(book.contacts[0].get("name"), Some("Ada"));
        assert_eq!(book.contacts[1].get("city"), Some("NYC"));
    }

    #[test]
    fn test_invalid_phone_reported_not_fatal() {
        let path = write_csv(
            "mixed.csv",
            "name,phone\nAda,+14155550100\nNoPhone,\nJunk,hello\n",
        );
        let book = read_contacts(&path).unwrap();
        assert_eq!(book.contacts.len(), 1);
        assert_eq!(book.invalid.len(), 2);
        assert_eq!(book.invalid[0].row, 2);
        assert_eq!(book.total_rows(), 3);
    }

    #[test]
    fn test_missing_phone_column_is_fatal() {
        let path = write_csv("nophone.csv", "name,email\nAda,ada@example.com\n");
        let err = read_contacts(&path).unwrap_err();
        assert!(matches!(err, SendloomError::Contacts(_)));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = read_contacts(Path::new("/nonexistent/contacts.csv")).unwrap_err();
        assert!(matches!(err, SendloomError::Contacts(_)));
    }
}

//! Request and response types for the file-management backend API.
//!
//! Field names are snake_case on the wire, matching the backend serializers.

use serde::{Deserialize, Serialize};

/// Login request body sent to POST /login/.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response from POST /login/.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Refresh request body sent to POST /token/refresh/.
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh response from POST /token/refresh/.
///
/// `refresh` is only present when the backend rotates refresh tokens.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Registration body for POST /register/.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone_number: String,
    pub password: String,
}

/// A user as returned by the backend (registration and file ownership).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub phone_number: String,
}

/// GET /profile/ response, including the user's addresses.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Profile {
    pub id: u64,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// PUT /profile/ body. Only username and phone number are editable.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub phone_number: String,
}

/// A postal address owned by the current user.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Address {
    pub id: u64,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Address body for create/update. Marking one address default clears the others server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AddressFields {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl Address {
    /// One-line rendering used in listings.
    pub fn summary(&self) -> String {
        format!("{}, {}, {}", self.street, self.city, self.country)
    }
}

/// Category assigned to an upload by the backend, based on the file extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Pdf,
    Excel,
    Txt,
    #[serde(other)]
    Other,
}

impl FileType {
    /// Classify a filename the same way the backend does.
    pub fn from_filename(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_uppercase(),
            None => return FileType::Other,
        };
        match ext.as_str() {
            "PDF" => FileType::Pdf,
            "XLS" | "XLSX" | "CSV" => FileType::Excel,
            "TXT" => FileType::Txt,
            _ => FileType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileType::Pdf => "PDF",
            FileType::Excel => "Excel",
            FileType::Txt => "Text",
            FileType::Other => "Other",
        }
    }
}

/// File metadata from GET /files/ and POST /files/upload/.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub id: u64,
    #[serde(default)]
    pub user: Option<User>,
    pub original_filename: String,
    pub file_type: FileType,
    pub upload_date: String,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// Per-type count in the dashboard breakdown.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FileTypeCount {
    pub file_type: FileType,
    pub count: u64,
}

/// Per-user upload count; only present for staff accounts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserFileCount {
    pub email: String,
    pub file_count: u64,
}

/// GET /dashboard/ response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_files: u64,
    #[serde(default)]
    pub file_types: Vec<FileTypeCount>,
    /// `None` for non-staff users.
    #[serde(default)]
    pub users_files: Option<Vec<UserFileCount>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_classification() {
        assert_eq!(FileType::from_filename("report.pdf"), FileType::Pdf);
        assert_eq!(FileType::from_filename("Budget.XLSX"), FileType::Excel);
        assert_eq!(FileType::from_filename("data.csv"), FileType::Excel);
        assert_eq!(FileType::from_filename("notes.txt"), FileType::Txt);
        assert_eq!(FileType::from_filename("photo.png"), FileType::Other);
        assert_eq!(FileType::from_filename("README"), FileType::Other);
    }

    #[test]
    fn test_uploaded_file_deserialize() {
        let json = serde_json::json!({
            "id": 3,
            "user": {"id": 1, "email": "ada@example.com", "username": "ada", "phone_number": ""},
            "original_filename": "report.pdf",
            "file_type": "PDF",
            "upload_date": "2024-05-01T10:00:00Z",
            "file_url": "http://localhost:8000/media/uploads/report.pdf"
        });
        let file: UploadedFile = serde_json::from_value(json).unwrap();
        assert_eq!(file.file_type, FileType::Pdf);
        assert_eq!(file.user.unwrap().username, "ada");
    }

    #[test]
    fn test_dashboard_users_files_null_for_non_staff() {
        let json = serde_json::json!({
            "total_files": 2,
            "file_types": [{"file_type": "TXT", "count": 2}],
            "users_files": null
        });
        let stats: DashboardStats = serde_json::from_value(json).unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.file_types[0].file_type, FileType::Txt);
        assert!(stats.users_files.is_none());
    }

    #[test]
    fn test_new_user_omits_empty_phone() {
        let user = NewUser {
            email: "ada@example.com".into(),
            username: "ada".into(),
            phone_number: String::new(),
            password: "secret".into(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("phone_number").is_none());
        assert_eq!(value["password"], "secret");
    }
}

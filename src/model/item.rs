//! Archive items, their closed vocabularies, and the viewer identity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::attachment::{FileAttachment, FileKind};

/// What the physical or digital object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ItemType {
    Book,
    Document,
    Photo,
    Video,
    #[serde(rename = "Audio Recording")]
    AudioRecording,
    Artwork,
    Clothing,
    Jewelry,
    Furniture,
    Tool,
    Toy,
    #[serde(rename = "Letter/Correspondence")]
    LetterCorrespondence,
    Certificate,
    Other,
}

impl ItemType {
    /// Every item type, in the order offered to users.
    pub const ALL: [ItemType; 14] = [
        Self::Book,
        Self::Document,
        Self::Photo,
        Self::Video,
        Self::AudioRecording,
        Self::Artwork,
        Self::Clothing,
        Self::Jewelry,
        Self::Furniture,
        Self::Tool,
        Self::Toy,
        Self::LetterCorrespondence,
        Self::Certificate,
        Self::Other,
    ];

    /// Human-readable label, identical to the stored value.
    pub fn label(self) -> &'static str {
        match self {
            Self::Book => "Book",
            Self::Document => "Document",
            Self::Photo => "Photo",
            Self::Video => "Video",
            Self::AudioRecording => "Audio Recording",
            Self::Artwork => "Artwork",
            Self::Clothing => "Clothing",
            Self::Jewelry => "Jewelry",
            Self::Furniture => "Furniture",
            Self::Tool => "Tool",
            Self::Toy => "Toy",
            Self::LetterCorrespondence => "Letter/Correspondence",
            Self::Certificate => "Certificate",
            Self::Other => "Other",
        }
    }
}

/// The part of family life an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Category {
    #[serde(rename = "Family History")]
    FamilyHistory,
    Military,
    Education,
    Religious,
    Professional,
    Personal,
    Medical,
    Legal,
    Financial,
    Genealogy,
    Other,
}

impl Category {
    /// Every category, in the order offered to users.
    pub const ALL: [Category; 11] = [
        Self::FamilyHistory,
        Self::Military,
        Self::Education,
        Self::Religious,
        Self::Professional,
        Self::Personal,
        Self::Medical,
        Self::Legal,
        Self::Financial,
        Self::Genealogy,
        Self::Other,
    ];

    /// Human-readable label, identical to the stored value.
    pub fn label(self) -> &'static str {
        match self {
            Self::FamilyHistory => "Family History",
            Self::Military => "Military",
            Self::Education => "Education",
            Self::Religious => "Religious",
            Self::Professional => "Professional",
            Self::Personal => "Personal",
            Self::Medical => "Medical",
            Self::Legal => "Legal",
            Self::Financial => "Financial",
            Self::Genealogy => "Genealogy",
            Self::Other => "Other",
        }
    }
}

/// Lowercase alphanumerics only, so "letter/correspondence",
/// "Letter Correspondence" and "letter-correspondence" compare equal.
fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(s);
        Self::ALL
            .into_iter()
            .find(|t| normalize_label(t.label()) == wanted)
            .ok_or_else(|| format!("unknown item type '{s}'"))
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(s);
        Self::ALL
            .into_iter()
            .find(|c| normalize_label(c.label()) == wanted)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A cataloged family-history record, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveItem {
    /// Assigned by the catalog on creation; immutable.
    pub id: String,

    /// Creator's user id. Never changed by edits.
    pub owner_id: String,

    /// Creator's email. Never changed by edits.
    pub owner_email: String,

    pub title: String,

    pub item_type: ItemType,

    pub category: Category,

    /// Rich text (HTML) or plain text.
    #[serde(default)]
    pub description: String,

    /// Rich text; may be generated from attachments and then edited.
    #[serde(default)]
    pub transcription: String,

    /// Free-form date the item relates to (usually `YYYY-MM-DD`).
    #[serde(default)]
    pub related_date: String,

    /// Where the physical object is kept.
    #[serde(default)]
    pub physical_location: String,

    /// Emails granted read access. Matched by exact string equality.
    #[serde(default)]
    pub shared_with: Vec<String>,

    /// Attachments in upload order. The first one is the thumbnail.
    #[serde(default)]
    pub files: Vec<FileAttachment>,

    /// Server-assigned; `None` while the server has not filled it in.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Server-assigned; never earlier than `created_at`.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ArchiveItem {
    /// Creation time as epoch milliseconds, `0` when missing.
    pub fn created_millis(&self) -> i64 {
        self.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    /// Whether `viewer` created this item.
    pub fn is_owned_by(&self, viewer: &Viewer) -> bool {
        self.owner_id == viewer.id
    }

    /// Whether this item is shared with `email`.
    pub fn is_shared_with(&self, email: &str) -> bool {
        self.shared_with.iter().any(|e| e == email)
    }

    /// Sum of attachment sizes in bytes.
    pub fn total_file_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// The first attachment, if it is an image.
    pub fn thumbnail(&self) -> Option<&FileAttachment> {
        self.files.first().filter(|f| f.kind() == FileKind::Image)
    }

    pub fn has_transcriptions(&self) -> bool {
        self.files.iter().any(|f| f.has_transcription)
    }

    pub fn has_ai_descriptions(&self) -> bool {
        self.files.iter().any(|f| f.has_ai_description)
    }
}

/// An item as seen by one viewer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleItem {
    #[serde(flatten)]
    pub item: ArchiveItem,

    /// Derived per viewer (`owner_id == viewer.id`). Only used for labels
    /// and client-side gating; the catalog enforces access itself.
    pub is_owner: bool,
}

impl std::ops::Deref for VisibleItem {
    type Target = ArchiveItem;

    fn deref(&self) -> &ArchiveItem {
        &self.item
    }
}

/// The authenticated user looking at the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: String,
    pub email: String,
}

impl Viewer {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    /// Both the id and the email must be non-empty.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::error::ArchiveError::InvalidItem(
                "viewer id is required".into(),
            ));
        }
        if self.email.trim().is_empty() {
            return Err(crate::error::ArchiveError::InvalidItem(
                "viewer email is required".into(),
            ));
        }
        Ok(())
    }
}

/// Editable metadata of an item, as collected from a form or the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub title: String,
    pub item_type: ItemType,
    pub category: Category,
    pub description: String,
    pub transcription: String,
    pub related_date: String,
    pub physical_location: String,
    pub shared_with: Vec<String>,
}

impl ItemDraft {
    pub fn new(title: impl Into<String>, item_type: ItemType, category: Category) -> Self {
        Self {
            title: title.into(),
            item_type,
            category,
            description: String::new(),
            transcription: String::new(),
            related_date: String::new(),
            physical_location: String::new(),
            shared_with: Vec::new(),
        }
    }

    /// Start from an existing item's metadata, for edits.
    pub fn from_item(item: &ArchiveItem) -> Self {
        Self {
            title: item.title.clone(),
            item_type: item.item_type,
            category: item.category,
            description: item.description.clone(),
            transcription: item.transcription.clone(),
            related_date: item.related_date.clone(),
            physical_location: item.physical_location.clone(),
            shared_with: item.shared_with.clone(),
        }
    }

    /// Trim fields and reject an empty title.
    pub fn normalized(mut self) -> crate::error::Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(crate::error::ArchiveError::InvalidItem(
                "title is required".into(),
            ));
        }
        self.related_date = self.related_date.trim().to_string();
        self.physical_location = self.physical_location.trim().to_string();
        let mut emails: Vec<String> = Vec::with_capacity(self.shared_with.len());
        for email in self.shared_with.iter().map(|e| e.trim()) {
            if !email.is_empty() && !emails.iter().any(|e| e == email) {
                emails.push(email.to_string());
            }
        }
        self.shared_with = emails;
        Ok(self)
    }
}

/// Split a comma-separated list of emails, trimming and dropping empties.
pub fn parse_shared_with(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_parse_is_lenient() {
        assert_eq!("letter/correspondence".parse(), Ok(ItemType::LetterCorrespondence));
        assert_eq!("Audio Recording".parse(), Ok(ItemType::AudioRecording));
        assert_eq!("audio-recording".parse(), Ok(ItemType::AudioRecording));
        assert!("spaceship".parse::<ItemType>().is_err());
    }

    #[test]
    fn test_category_parse_and_display() {
        let c: Category = "family history".parse().expect("parse");
        assert_eq!(c, Category::FamilyHistory);
        assert_eq!(c.to_string(), "Family History");
    }

    #[test]
    fn test_labels_match_serde() {
        for t in ItemType::ALL {
            let json = serde_json::to_string(&t).expect("serialize");
            assert_eq!(json, format!("\"{}\"", t.label()));
        }
        for c in Category::ALL {
            let json = serde_json::to_string(&c).expect("serialize");
            assert_eq!(json, format!("\"{}\"", c.label()));
        }
    }

    #[test]
    fn test_parse_shared_with() {
        assert_eq!(
            parse_shared_with(" a@x.com, ,b@x.com ,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
        assert!(parse_shared_with("   ").is_empty());
    }

    #[test]
    fn test_draft_normalized_rejects_blank_title() {
        let draft = ItemDraft::new("   ", ItemType::Book, Category::Other);
        assert!(draft.normalized().is_err());
    }

    #[test]
    fn test_draft_normalized_dedupes_emails() {
        let mut draft = ItemDraft::new(" Medal ", ItemType::Other, Category::Military);
        draft.shared_with = vec!["b@x.com".into(), " b@x.com".into(), "".into()];
        let draft = draft.normalized().expect("valid");
        assert_eq!(draft.title, "Medal");
        assert_eq!(draft.shared_with, vec!["b@x.com".to_string()]);
    }

    #[test]
    fn test_viewer_validate() {
        assert!(Viewer::new("u1", "a@x.com").validate().is_ok());
        assert!(Viewer::new("", "a@x.com").validate().is_err());
        assert!(Viewer::new("u1", " ").validate().is_err());
    }

    #[test]
    fn test_item_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "id": "i1",
            "ownerId": "u1",
            "ownerEmail": "a@x.com",
            "title": "Letter",
            "itemType": "Letter/Correspondence",
            "category": "Family History"
        }"#;
        let item: ArchiveItem = serde_json::from_str(json).expect("deserialize");
        assert!(item.files.is_empty());
        assert!(item.created_at.is_none());
        assert_eq!(item.created_millis(), 0);
    }

    #[test]
    fn test_thumbnail_is_first_file_when_image() {
        let file = |name: &str, mime: &str| FileAttachment {
            name: name.into(),
            mime_type: mime.into(),
            size: 1,
            url: format!("mem://{name}"),
            path: name.into(),
            uploaded_at: chrono::Utc::now(),
            transcription: None,
            has_transcription: false,
            ai_description: None,
            has_ai_description: false,
        };
        let mut item = ArchiveItem {
            id: "i1".into(),
            owner_id: "u1".into(),
            owner_email: "a@x.com".into(),
            title: "Album".into(),
            item_type: ItemType::Photo,
            category: Category::Personal,
            description: String::new(),
            transcription: String::new(),
            related_date: String::new(),
            physical_location: String::new(),
            shared_with: vec![],
            files: vec![file("cover.jpg", "image/jpeg"), file("notes.pdf", "application/pdf")],
            created_at: None,
            updated_at: None,
        };
        assert_eq!(item.thumbnail().map(|f| f.name.as_str()), Some("cover.jpg"));

        item.files.reverse();
        assert!(item.thumbnail().is_none());
    }
}

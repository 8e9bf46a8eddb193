use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

/// Zero-width space; the platform rejects empty field names and values
const BLANK: &str = "\u{200b}";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "color", skip_serializing_if = "Option::is_none")]
    pub colour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl Embed {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn colour(mut self, colour: u32) -> Self {
        self.colour = Some(colour);
        self
    }

    pub fn author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(EmbedAuthor {
            name: name.into(),
            icon_url,
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: non_blank(name.into()),
            value: non_blank(value.into()),
            inline,
        });
        self
    }

    /// Untitled inline field
    pub fn note(self, value: impl Into<String>) -> Self {
        self.field("", value, true)
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    /// Text of every field value, for logging and tests
    pub fn field_values(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.value.as_str()).collect()
    }
}

fn non_blank(s: String) -> String {
    if s.is_empty() {
        BLANK.to_string()
    } else {
        s
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub name: String,
    pub data: Bytes,
}

/// Everything a command wants sent back to the invoking user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub files: Vec<FileAttachment>,
    /// Only the invoking user can see the reply
    pub ephemeral: bool,
    /// Delete the reply after this long
    pub delete_after: Option<Duration>,
    /// Extra pages for a paginated reply; `embeds` holds the first
    pub pages: Vec<Embed>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    /// First of several pages
    pub fn paged(mut pages: Vec<Embed>) -> Self {
        if pages.is_empty() {
            return Self::default();
        }
        let first = pages.remove(0);
        Self {
            embeds: vec![first],
            pages,
            ..Default::default()
        }
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    pub fn delete_after(mut self, after: Option<Duration>) -> Self {
        self.delete_after = after;
        self
    }

    pub fn attach(mut self, name: impl Into<String>, data: Bytes) -> Self {
        self.files.push(FileAttachment {
            name: name.into(),
            data,
        });
        self
    }

    pub fn page_count(&self) -> usize {
        self.embeds.len().min(1) + self.pages.len()
    }

    /// JSON body for a message create/edit, without attachment bytes
    pub fn to_message_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "content": self.content.clone().unwrap_or_default(),
            "embeds": self.embeds,
            "allowed_mentions": { "parse": [] },
        });
        if !self.files.is_empty() {
            body["attachments"] = self
                .files
                .iter()
                .enumerate()
                .map(|(i, f)| serde_json::json!({ "id": i, "filename": f.name }))
                .collect();
        }
        body
    }
}

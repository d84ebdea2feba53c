// Roster - membership and identity backend for an XMPP service provider
// Copyright (C) 2026 Roster Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::slug::slugify;

/// A dated announcement. Listed sticky-first, then newest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlogPost {
    pub id: Option<i64>,
    pub title: String,
    pub slug: String,
    /// Markdown source; rendered and sanitized at display time.
    pub text: String,
    pub author_id: i64,
    pub published: bool,
    pub publication_date: DateTime<Utc>,
    pub sticky: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn new(title: &str, text: &str, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title: title.to_string(),
            slug: slugify(title),
            text: text.to_string(),
            author_id,
            published: true,
            publication_date: now,
            sticky: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Visible to anonymous visitors?
    pub fn is_public(&self, now: DateTime<Utc>) -> bool {
        self.published && self.publication_date < now
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.slug = slugify(title);
        self.updated_at = Utc::now();
    }
}

/// A static CMS page (FAQ, privacy policy, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub text: String,
    pub author_id: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(title: &str, text: &str, author_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title: title.to_string(),
            slug: slugify(title),
            text: text.to_string(),
            author_id,
            published: true,
            created_at: now,
            updated_at: now,
        }
    }
}

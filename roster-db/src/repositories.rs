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

pub mod blocklist_repository;
pub mod blog_post_repository;
pub mod certificate_repository;
pub mod confirmation_repository;
pub mod gpg_key_repository;
pub mod page_repository;
pub mod session_repository;
pub mod stat_repository;
pub mod user_log_repository;
pub mod user_repository;

pub use blocklist_repository::*;
pub use blog_post_repository::*;
pub use certificate_repository::*;
pub use confirmation_repository::*;
pub use gpg_key_repository::*;
pub use page_repository::*;
pub use session_repository::*;
pub use stat_repository::*;
pub use user_log_repository::*;
pub use user_repository::*;

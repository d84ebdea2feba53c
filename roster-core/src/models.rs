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

pub mod blocklist;
pub mod blog;
pub mod certificate;
pub mod confirmation;
pub mod gpg_key;
pub mod jid;
pub mod log_entry;
pub mod session;
pub mod stat;
pub mod user;

pub use blocklist::*;
pub use blog::*;
pub use certificate::*;
pub use confirmation::*;
pub use gpg_key::*;
pub use jid::*;
pub use log_entry::*;
pub use session::*;
pub use stat::*;
pub use user::*;

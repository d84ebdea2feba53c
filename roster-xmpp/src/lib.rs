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

//! Client for the XMPP server's account management API. The web handlers
//! and housekeeping jobs talk to the server exclusively through the
//! [`XmppBackend`] trait; [`HttpBackend`] is the production implementation
//! and [`MemoryBackend`] backs the tests.

pub mod backend;
pub mod http;
pub mod memory;

pub use backend::XmppBackend;
pub use http::HttpBackend;
pub use memory::MemoryBackend;

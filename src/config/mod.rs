// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for Arcana
//!
//! Handles the settings file, the key-value store the resolver reads, the
//! environment default relay and the resolution between them.

pub mod defaults;
pub mod resolver;
pub mod settings;
pub mod store;

pub use defaults::DefaultLlmConfig;
pub use resolver::{resolve, ApiConfiguration, ResolvedConfig, FALLBACK_MODEL};
pub use settings::*;
pub use store::{ConfigurationStore, FileConfigStore, MemoryConfigStore};

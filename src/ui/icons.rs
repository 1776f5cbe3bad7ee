//! Shared UI icons.
//!
//! Each icon falls back to plain text on terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Phase indicators
pub static PLANNER: Emoji<'_, '_> = Emoji("🗺️  ", "[P]");
pub static BUILDER: Emoji<'_, '_> = Emoji("🔨 ", "[B]");
pub static REVIEWER: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[-]");

// Signal indicators
pub static BLOCKER: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");
pub static BAILOUT: Emoji<'_, '_> = Emoji("🪂 ", "[BAIL]");
pub static LOOP: Emoji<'_, '_> = Emoji("🔄 ", "[LOOP]");
pub static TOKENS: Emoji<'_, '_> = Emoji("📊 ", "[TOK]");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", ">");

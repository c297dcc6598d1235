//! fontlink-core: temporary font activation through managed symlinks.
//!
//! Fonts are never copied or installed. Each font placed in a set becomes a
//! group of symlinks (the font file plus, for PostScript outlines, its
//! metrics file) inside a directory the host font renderer already scans.
//! Enabling a font takes a reference on its group; the links exist while
//! at least one enabled entry in any set holds them.
//!
//! ## Pieces
//!
//! - [`link::LinkEngine`]: the reference-counted link table. It sweeps every
//!   link it still holds when dropped.
//! - [`font_set::FontSet`]: ordered fonts, unique by filename, with an
//!   observable count of enabled entries.
//! - [`catalog::SetCatalog`]: named sets addressed by stable handles, with a
//!   JSON document for persistence.
//! - [`discovery`]: the snapshot of fonts the host already provides; those
//!   are never linked.
//! - [`session::Session`]: everything above owned together, with the
//!   startup load and the ordered shutdown.
//!
//! ```rust,no_run
//! use fontlink_core::config::Paths;
//! use fontlink_core::discovery::FcListDiscovery;
//! use fontlink_core::link::LinkEngine;
//! use fontlink_core::session::Session;
//!
//! let paths = Paths::resolve(None, None)?;
//! let mut session = Session::open(paths, &FcListDiscovery::new(), LinkEngine::new())?;
//!
//! let set = session.add_set("Display", None);
//! session.add_fonts(set, ["/home/me/fonts/Foo.ttf"]);
//!
//! // Saves the sets and removes the links.
//! session.close();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod catalog;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod font_set;
pub mod link;
pub mod naming;
pub mod output;
pub mod session;
pub mod settings;

//! # wordcloud-worker
//!
//! A background worker that watches a directory for word-frequency requests
//! and turns each one into a word-cloud PNG. The directory is the queue: a bot
//! drops `<id>[.<mask>].generate.json` files in, the worker writes
//! `<id>.generated.png` files out, and a plain-text ledger next to the requests
//! remembers what has been done.
//!
//! # Architecture: One Loop
//!
//! ```text
//! scan watch dir  →  load JSON  →  render (+ mask)  →  write PNG  →  persist ledger
//!       ▲                                                                  │
//!       └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread, one request at a time. The only wait is the
//! scanner's sleep between empty directory passes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Lists the watch directory and returns the first unseen request |
//! | [`naming`] | `<id>[.<mask>].generate.json` parser (strict UUID or permissive) |
//! | [`ledger`] | Handled-ID list persisted as `ids_handled.txt` |
//! | [`request`] | JSON word → weight table loading |
//! | [`masks`] | Shape masks loaded and scaled once at startup |
//! | [`render`] | Word-cloud layout and PNG output behind the [`render::Renderer`] trait |
//! | [`worker`] | The dispatch loop, recording policy, and error policy |
//! | [`config`] | `worker.toml` loading, validation, merging, stock defaults |
//! | [`output`] | CLI output formatting for startup and per-request progress |
//!
//! # Design Decisions
//!
//! ## Polling, Not Notifications
//!
//! The scanner lists the directory every `poll_interval_ms` (400 ms by
//! default). Requests arrive a few times a minute at most, so a full listing
//! is cheap, works the same on every filesystem including network shares, and
//! needs no platform watcher.
//!
//! ## Mark Handled When Found
//!
//! By default an id enters the in-memory ledger as soon as the scanner
//! matches it, before the render runs. Combined with
//! `errors.policy = "log_and_continue"`, a request that fails to render is
//! persisted as handled and skipped forever. Under the default `fail_fast`
//! the worker exits before saving that iteration, so a restart retries the
//! same request. Setting `ledger.record = "after_render"` records only
//! requests whose image was written.
//!
//! ## Fail Fast by Default
//!
//! The first failed request stops the worker with a non-zero exit. The
//! ledger from the last completed iteration stays on disk, so a restart
//! resumes from there. `errors.policy = "log_and_continue"` keeps the loop
//! alive instead.
//!
//! ## Pure-Rust Rendering
//!
//! Layout is a greedy placer over an integral-image occupancy grid, glyphs are
//! rasterised by `resvg`, and PNGs are written by the `image` crate. No
//! native image libraries.

pub mod config;
pub mod ledger;
pub mod masks;
pub mod naming;
pub mod output;
pub mod render;
pub mod request;
pub mod scan;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;

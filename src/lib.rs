//! # Claimsift
//!
//! A claim-verification pipeline for chat-borne misinformation.
//!
//! Claimsift takes normalized chat messages, filters out conversational
//! noise, gathers evidence from a local reference corpus and external search
//! sources, and produces a deterministic verdict (HOAX, VERIFIED, or
//! UNCERTAIN) with a durable audit trail.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────────┐
//! │ Message  │──▶│ Gatekeeper │──▶│ Orchestrator  │
//! │ (adapter)│   │ skip/admit │   │ state machine │
//! └──────────┘   └────────────┘   └──────┬────────┘
//!                                        │
//!              ┌────────────┬────────────┼────────────┐
//!              ▼            ▼            ▼            ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │  Local   │ │   Web    │ │  Neural  │ │  Video   │
//!        │  index   │ │  search  │ │  search  │ │ evidence │
//!        └──────────┘ └──────────┘ └──────────┘ └──────────┘
//!                                        │
//!                                        ▼
//!                              ┌──────────────────┐
//!                              │ Verdict + log    │
//!                              └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`matcher`] | Typo-tolerant term matching |
//! | [`gatekeeper`] | Pre-filter: skip/admit decisions |
//! | [`index`] | Local reference-document index |
//! | [`evidence`] | External evidence sources |
//! | [`video`] | Video metadata and transcript evidence |
//! | [`orchestrator`] | Verdict state machine |
//! | [`log`] | Durable verification log |

pub mod config;
pub mod evidence;
pub mod gatekeeper;
pub mod index;
pub mod log;
pub mod matcher;
pub mod models;
pub mod orchestrator;
pub mod video;

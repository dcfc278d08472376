// ─── ModSync Core ───
// Reconciles a game server's plugin folder with a mod manifest and the
// package registry.
//
// Architecture:
//   core/
//     manifest/ — Manifest model + atomic on-disk store
//     registry/ — Registry metadata + archive downloads (rate limited)
//     plugins/  — Plugin folder scan, quarantine, archive install
//     sync/     — Per-entry decision + sequential orchestration
//     state/    — Settings resolution + component wiring

pub mod error;
pub mod http;
pub mod manifest;
pub mod plugins;
pub mod registry;
pub mod state;
pub mod sync;

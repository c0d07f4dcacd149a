//! WebAssembly bindings for the Water Barons engine.
//!
//! This module exposes a hot-seat match to JavaScript through wasm-bindgen.
//! Card content arrives as TOML text since the browser has no filesystem.

use wasm_bindgen::prelude::*;

use crate::actions::Move;
use crate::catalog::{Catalog, Metadata};
use crate::game::GameState;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed match wrapper
#[wasm_bindgen]
pub struct WasmMatch {
    state: GameState,
}

#[wasm_bindgen]
impl WasmMatch {
    /// Create a match from content and metadata TOML documents
    #[wasm_bindgen(constructor)]
    pub fn new(num_players: u8, content_toml: &str, metadata_toml: &str) -> Result<WasmMatch, JsValue> {
        let metadata = Metadata::from_toml(metadata_toml)
            .map_err(|e| JsValue::from_str(&format!("Invalid metadata: {}", e)))?;
        let catalog = Catalog::from_toml(content_toml)
            .map_err(|e| JsValue::from_str(&format!("Invalid content: {}", e)))?
            .with_metadata(metadata);

        let mut state = GameState::setup(num_players, &catalog)
            .map_err(|e| JsValue::from_str(&format!("Setup failed: {}", e)))?;
        state.shuffle_decks(&mut rand::thread_rng());

        Ok(WasmMatch { state })
    }

    /// Get the public snapshot as JSON
    #[wasm_bindgen(js_name = getSnapshot)]
    pub fn get_snapshot(&self) -> String {
        serde_json::to_string(&self.state.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    #[wasm_bindgen(js_name = getCurrentPlayer)]
    pub fn get_current_player(&self) -> u8 {
        self.state.current_player
    }

    #[wasm_bindgen(js_name = isOver)]
    pub fn is_over(&self) -> bool {
        self.state.is_over()
    }

    /// Apply a move from JSON, returns events JSON or error
    #[wasm_bindgen(js_name = applyMove)]
    pub fn apply_move(&mut self, player: u8, move_json: &str) -> Result<String, JsValue> {
        let action: Move = serde_json::from_str(move_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid move JSON: {}", e)))?;

        match self.state.apply_move(player, action) {
            Ok(events) => Ok(serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string())),
            Err(e) => Err(JsValue::from_str(&format!("Move failed: {}", e))),
        }
    }

    #[wasm_bindgen(js_name = startWhimDraft)]
    pub fn start_whim_draft(&mut self, options_per_player: usize) -> Result<String, JsValue> {
        match self.state.start_draft(options_per_player) {
            Ok(events) => Ok(serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string())),
            Err(e) => Err(JsValue::from_str(&format!("Draft failed: {}", e))),
        }
    }

    #[wasm_bindgen(js_name = submitWhimChoice)]
    pub fn submit_whim_choice(&mut self, player: u8, chosen_index: usize) -> Result<String, JsValue> {
        match self.state.submit_choice(player, chosen_index) {
            Ok(events) => Ok(serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string())),
            Err(e) => Err(JsValue::from_str(&format!("Choice failed: {}", e))),
        }
    }

    /// Private draft options for one player as a JSON array (`null` outside a draft).
    /// Hot-seat only: the caller is trusted to show them to the right person.
    #[wasm_bindgen(js_name = getDraftOptions)]
    pub fn get_draft_options(&self, player: u8) -> String {
        match self.state.draft_options(player) {
            Some(options) => serde_json::to_string(options).unwrap_or_else(|_| "[]".to_string()),
            None => "null".to_string(),
        }
    }
}

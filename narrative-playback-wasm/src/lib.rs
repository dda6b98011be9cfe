//! WASM bindings for narrative-playback — test-play from the web authoring tool.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use narrative_playback::core::channel::EventRecorder;
use narrative_playback::core::config::DirectorConfig;
use narrative_playback::core::director::NarrativeDirector;
use narrative_playback::schema::scenario::Scenario;

// ---------------------------------------------------------------------------
// Embedded sample content — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const CITY_TOUR_SCENARIO: &str = include_str!("../../tests/fixtures/city_tour.json");
    pub const CITY_TOUR_CONFIG: &str = include_str!("../../tests/fixtures/city_tour.ron");
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

fn playback_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("Playback error: {e}"))
}

// ---------------------------------------------------------------------------
// PlaySession — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct PlaySession {
    director: NarrativeDirector,
    events: EventRecorder,
}

#[wasm_bindgen]
impl PlaySession {
    /// Create a session from a scenario document (`{"scenes": [...]}`), an
    /// optional RON configuration and an optional seed.
    #[wasm_bindgen(constructor)]
    pub fn new(
        scenario_json: &str,
        config_ron: Option<String>,
        seed: Option<u64>,
    ) -> Result<PlaySession, JsError> {
        let scenario = Scenario::from_json(scenario_json)
            .map_err(|e| JsError::new(&format!("Scenario parse error: {e}")))?;

        let config = match config_ron {
            Some(src) => DirectorConfig::parse_ron(&src)
                .map_err(|e| JsError::new(&format!("Config parse error: {e}")))?,
            None => DirectorConfig::default(),
        };

        let mut builder = NarrativeDirector::builder().scenario(scenario).config(config);
        if let Some(seed) = seed {
            builder = builder.seed(seed);
        }
        let mut director = builder
            .build()
            .map_err(|e| JsError::new(&format!("Director build error: {e}")))?;
        let events = director.channel_mut().recorder();

        Ok(PlaySession { director, events })
    }

    /// A session over the bundled city-tour sample.
    pub fn demo(seed: Option<u64>) -> Result<PlaySession, JsError> {
        PlaySession::new(
            data::CITY_TOUR_SCENARIO,
            Some(data::CITY_TOUR_CONFIG.to_string()),
            seed,
        )
    }

    pub fn start(&mut self) -> Result<(), JsError> {
        self.director.start().map_err(playback_error)
    }

    pub fn advance(&mut self) -> Result<(), JsError> {
        self.director.advance().map_err(playback_error)
    }

    /// Take the `index`-th available choice. Returns false if there is none.
    pub fn choose(&mut self, index: usize) -> Result<bool, JsError> {
        self.director.choose(index).map_err(playback_error)
    }

    pub fn load_scene(&mut self, scene_id: &str) -> Result<(), JsError> {
        self.director.load_scene(scene_id).map_err(playback_error)
    }

    /// Events emitted since the last drain, as a JSON array of
    /// `{"type": "...", "payload": ...}` objects.
    pub fn drain_events(&mut self) -> Result<String, JsError> {
        to_json(&self.events.take())
    }

    /// Current variable values as a JSON object.
    pub fn variables(&self) -> Result<String, JsError> {
        to_json(&self.director.snapshot())
    }

    pub fn history(&self) -> Result<String, JsError> {
        to_json(self.director.history())
    }

    pub fn available_choices(&self) -> Result<String, JsError> {
        to_json(self.director.available_choices())
    }

    pub fn current_dialogue(&self) -> Result<String, JsError> {
        to_json(&self.director.current_dialogue())
    }

    pub fn is_ended(&self) -> bool {
        self.director.is_ended()
    }

    pub fn final_score(&self) -> f64 {
        self.director.final_score()
    }

    /// The earned ending band as JSON, or `null`.
    pub fn ending(&self) -> Result<String, JsError> {
        to_json(&self.director.ending())
    }

    pub fn reset(&mut self) {
        self.director.reset();
        self.events.clear();
    }
}

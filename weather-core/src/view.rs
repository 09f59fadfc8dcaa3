//! View state and the pure functions that turn readings into display text.
//!
//! The UI shows exactly one of four states at a time. [`ViewState`] is a
//! single enum so that invariant holds by construction; adapters (the
//! terminal renderer in `weather-cli`) only ever read it.

use crate::model::{CurrentWeatherReading, ForecastDay};

pub const EMPTY_INPUT_PROMPT: &str = "Please enter a city name!";
pub const GEOLOCATION_UNSUPPORTED_PROMPT: &str = "Geolocation is not supported on this host";
pub const GEOLOCATION_FAILED_PROMPT: &str =
    "Unable to retrieve your location. Please enter a city name manually.";
pub const ERROR_MESSAGE: &str = "City not found or weather unavailable. Please try again.";

/// Display slots for the current conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentView {
    /// "{name}, {country}"
    pub label: String,
    pub temperature: String,
    pub description: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind: String,
    pub icon_url: String,
    pub icon_alt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntryView {
    pub day: String,
    pub icon_url: String,
    pub icon_alt: String,
    pub temperature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub current: CurrentView,
    pub forecast: Vec<ForecastEntryView>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState {
    #[default]
    Initial,
    Loading,
    Result(ResultView),
    Error,
}

impl ViewState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Initial => "initial",
            ViewState::Loading => "loading",
            ViewState::Result(_) => "result",
            ViewState::Error => "error",
        }
    }
}

/// Everything the user can see: the state panel plus the search input.
#[derive(Debug, Clone)]
pub struct View {
    state: ViewState,
    before_loading: Option<ViewState>,
    icon_base_url: String,
    /// Text currently in the search input.
    pub input: String,
    /// Transient message for the user, e.g. after an empty search.
    pub prompt: Option<String>,
    /// Whether the search input has focus.
    pub focused: bool,
}

impl View {
    pub fn new(icon_base_url: impl Into<String>) -> Self {
        Self {
            state: ViewState::Initial,
            before_loading: None,
            icon_base_url: icon_base_url.into(),
            input: String::new(),
            prompt: None,
            focused: false,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn show_loading(&mut self) {
        if self.state != ViewState::Loading {
            let prior = std::mem::replace(&mut self.state, ViewState::Loading);
            self.before_loading = Some(prior);
        }
        self.prompt = None;
    }

    /// Leave the loading state without a result, going back to whatever
    /// was visible before it.
    pub fn cancel_loading(&mut self) {
        if self.state == ViewState::Loading {
            self.state = self.before_loading.take().unwrap_or_default();
        }
    }

    /// Replace whatever is shown, including any previous forecast, with
    /// the new reading.
    pub fn show_result(&mut self, reading: &CurrentWeatherReading, forecast: &[ForecastDay]) {
        self.state = ViewState::Result(ResultView {
            current: render_current(reading, &self.icon_base_url),
            forecast: render_forecast(forecast, &self.icon_base_url),
        });
        self.before_loading = None;
    }

    pub fn show_error(&mut self) {
        self.state = ViewState::Error;
        self.before_loading = None;
    }
}

pub fn render_current(reading: &CurrentWeatherReading, icon_base_url: &str) -> CurrentView {
    CurrentView {
        label: format!("{}, {}", reading.location_name, reading.country_code),
        temperature: format_celsius(reading.temperature_c),
        description: reading.description.clone(),
        feels_like: format_celsius(reading.feels_like_c),
        humidity: format!("{}%", reading.humidity_pct),
        wind: format!("{} m/s", reading.wind_speed_mps),
        icon_url: format!("{}/{}@2x.png", icon_base_url.trim_end_matches('/'), reading.icon_code),
        icon_alt: reading.description.clone(),
    }
}

/// One entry per day, in the order given.
pub fn render_forecast(days: &[ForecastDay], icon_base_url: &str) -> Vec<ForecastEntryView> {
    let base = icon_base_url.trim_end_matches('/');
    days.iter()
        .map(|day| ForecastEntryView {
            day: day.day_label.clone(),
            icon_url: format!("{base}/{}.png", day.icon_code),
            icon_alt: day.description.clone(),
            temperature: format_celsius(day.temperature_c),
        })
        .collect()
}

pub fn format_celsius(value: f64) -> String {
    format!("{}°C", round_half_up(value))
}

/// Nearest integer, halves toward positive infinity (-0.5 becomes 0).
pub fn round_half_up(value: f64) -> i64 {
    // `x + 0.5` would round values just below a half up.
    let rounded = if value - value.floor() == 0.5 {
        value.ceil()
    } else {
        value.round()
    };
    rounded as i64
}

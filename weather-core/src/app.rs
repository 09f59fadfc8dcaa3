//! The lookup pipeline and the user actions that drive it.
//!
//! Every lookup takes a generation number when it starts. After each
//! await it re-checks that number and stops without touching the view or
//! the store once a newer lookup has begun.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    Config,
    error::{GeolocationError, LookupError},
    geolocation::{Geolocator, IpGeolocator},
    model::Query,
    provider::{WeatherProvider, provider_from_config},
    store::{FileStore, LastCityStore},
    view::{
        EMPTY_INPUT_PROMPT, GEOLOCATION_FAILED_PROMPT, GEOLOCATION_UNSUPPORTED_PROMPT, View,
    },
};

/// How a single user action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Current weather and forecast are on screen.
    Rendered,
    /// The provider doesn't know the place.
    NotFound,
    /// A request failed; the error state is shown.
    Failed,
    /// A newer lookup started first; this one was dropped.
    Stale,
    /// No request was made (empty input, no position).
    Rejected,
}

#[derive(Debug)]
pub struct App {
    provider: Arc<dyn WeatherProvider>,
    store: Arc<dyn LastCityStore>,
    geolocator: Arc<dyn Geolocator>,
    view: Mutex<View>,
    generation: AtomicU64,
}

impl App {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        store: Arc<dyn LastCityStore>,
        geolocator: Arc<dyn Geolocator>,
        view: View,
    ) -> Self {
        Self {
            provider,
            store,
            geolocator,
            view: Mutex::new(view),
            generation: AtomicU64::new(0),
        }
    }

    /// Wire the OpenWeather client, the on-disk store and the IP locator.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider: Arc<dyn WeatherProvider> = Arc::from(provider_from_config(config)?);
        let store = Arc::new(FileStore::default_location()?);
        let geolocator = Arc::new(IpGeolocator::from_config(&config.geolocation));

        Ok(Self::new(provider, store, geolocator, View::new(config.icon_base_url.clone())))
    }

    /// Snapshot of what is currently visible.
    pub fn view(&self) -> View {
        self.view.lock().clone()
    }

    pub fn clear_prompt(&self) {
        self.view.lock().prompt = None;
    }

    /// Page-load behaviour: search the remembered city if there is one.
    ///
    /// Returns `None` when nothing was remembered; the view stays in its
    /// initial state with the input focused.
    pub async fn startup(&self) -> Option<LookupOutcome> {
        let last_city = match self.store.load_last_city() {
            Ok(city) => city.filter(|c| !c.trim().is_empty()),
            Err(e) => {
                tracing::warn!("failed to load last city: {e:#}");
                None
            }
        };

        {
            let mut view = self.view.lock();
            view.focused = true;
            if let Some(city) = &last_city {
                view.input = city.clone();
            }
        }

        match last_city {
            Some(city) => {
                tracing::info!(%city, "resuming last searched city");
                Some(self.lookup(Query::City(city)).await)
            }
            None => None,
        }
    }

    /// Search for whatever the user typed.
    pub async fn submit(&self, raw: &str) -> LookupOutcome {
        let city = raw.trim();

        {
            let mut view = self.view.lock();
            view.input = raw.to_string();
            if city.is_empty() {
                view.prompt = Some(EMPTY_INPUT_PROMPT.to_string());
                return LookupOutcome::Rejected;
            }
        }

        self.lookup(Query::City(city.to_string())).await
    }

    /// Search for the host's current position.
    pub async fn locate(&self) -> LookupOutcome {
        if !self.geolocator.is_supported() {
            self.view.lock().prompt = Some(GEOLOCATION_UNSUPPORTED_PROMPT.to_string());
            return LookupOutcome::Rejected;
        }

        let id = self.begin();
        self.view.lock().show_loading();

        let located = self.geolocator.locate().await;
        if !self.is_latest(id) {
            return LookupOutcome::Stale;
        }

        match located {
            Ok(coords) => self.run_lookup(id, Query::Coordinates(coords)).await,
            Err(e) => {
                tracing::warn!("geolocation failed: {e}");
                let prompt = match e {
                    GeolocationError::Unsupported => GEOLOCATION_UNSUPPORTED_PROMPT,
                    GeolocationError::Denied(_) | GeolocationError::PositionUnavailable(_) => {
                        GEOLOCATION_FAILED_PROMPT
                    }
                };
                let mut view = self.view.lock();
                view.cancel_loading();
                view.prompt = Some(prompt.to_string());
                LookupOutcome::Rejected
            }
        }
    }

    /// Fetch, render and remember one place.
    pub async fn lookup(&self, query: Query) -> LookupOutcome {
        let id = self.begin();
        self.view.lock().show_loading();
        self.run_lookup(id, query).await
    }

    async fn run_lookup(&self, id: u64, query: Query) -> LookupOutcome {
        let current = self.provider.fetch_current(&query).await;
        if !self.is_latest(id) {
            tracing::debug!(%query, "discarding stale current weather");
            return LookupOutcome::Stale;
        }

        let reading = match current {
            Ok(reading) => reading,
            Err(e) => return self.fail(&query, e),
        };

        let forecast = self.provider.fetch_forecast(&query).await;
        if !self.is_latest(id) {
            tracing::debug!(%query, "discarding stale forecast");
            return LookupOutcome::Stale;
        }

        let forecast = match forecast {
            Ok(days) => days,
            Err(e) => return self.fail(&query, e),
        };

        {
            let mut view = self.view.lock();
            view.show_result(&reading, &forecast);
            if matches!(query, Query::Coordinates(_)) {
                view.input = reading.location_name.clone();
            }
        }

        let remembered = match &query {
            Query::City(name) => name.as_str(),
            Query::Coordinates(_) => reading.location_name.as_str(),
        };
        if let Err(e) = self.store.save_last_city(remembered) {
            tracing::warn!("failed to save last city: {e:#}");
        }

        tracing::info!(
            %query,
            location = %reading.location_name,
            days = forecast.len(),
            "lookup rendered"
        );
        LookupOutcome::Rendered
    }

    fn fail(&self, query: &Query, err: LookupError) -> LookupOutcome {
        self.view.lock().show_error();

        match err {
            LookupError::NotFound => {
                tracing::info!(%query, "location not found");
                LookupOutcome::NotFound
            }
            LookupError::Transport(msg) => {
                tracing::error!(%query, "error fetching weather data: {msg}");
                LookupOutcome::Failed
            }
        }
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, id: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Coordinates, CurrentWeatherReading, ForecastDay},
        store::MemoryStore,
        view::ViewState,
    };
    use async_trait::async_trait;
    use std::{collections::HashMap, time::Duration};

    const ICONS: &str = "https://openweathermap.org/img/wn";

    #[derive(Debug, Default)]
    struct FakeProvider {
        places: HashMap<String, (f64, String)>,
        delays_ms: HashMap<String, u64>,
        current_fails: bool,
        forecast_fails: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn with_place(mut self, key: &str, temp: f64, name: &str) -> Self {
            self.places.insert(key.to_string(), (temp, name.to_string()));
            self
        }

        fn with_delay(mut self, key: &str, ms: u64) -> Self {
            self.delays_ms.insert(key.to_string(), ms);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn fetch_current(&self, query: &Query) -> Result<CurrentWeatherReading, LookupError> {
            let key = query.to_string();
            self.calls.lock().push(format!("current:{key}"));
            if let Some(ms) = self.delays_ms.get(&key) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.current_fails {
                return Err(LookupError::transport("connection refused"));
            }

            let (temp, name) = self.places.get(&key).cloned().ok_or(LookupError::NotFound)?;
            Ok(CurrentWeatherReading {
                location_name: name,
                country_code: "FR".into(),
                temperature_c: temp,
                feels_like_c: temp - 1.0,
                humidity_pct: 60,
                wind_speed_mps: 3.1,
                description: "clear sky".into(),
                icon_code: "01d".into(),
            })
        }

        async fn fetch_forecast(&self, query: &Query) -> Result<Vec<ForecastDay>, LookupError> {
            self.calls.lock().push(format!("forecast:{query}"));
            if self.forecast_fails {
                return Err(LookupError::transport("connection reset"));
            }
            Ok(vec![ForecastDay {
                day_label: "Mon".into(),
                icon_code: "02d".into(),
                description: "few clouds".into(),
                temperature_c: 10.2,
            }])
        }
    }

    #[derive(Debug)]
    struct FakeLocator {
        result: Result<Coordinates, GeolocationError>,
        supported: bool,
        delay_ms: u64,
    }

    impl FakeLocator {
        fn new(result: Result<Coordinates, GeolocationError>) -> Self {
            Self {
                result,
                supported: true,
                delay_ms: 0,
            }
        }
    }

    #[async_trait]
    impl Geolocator for FakeLocator {
        async fn locate(&self) -> Result<Coordinates, GeolocationError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.result.clone()
        }

        fn is_supported(&self) -> bool {
            self.supported
        }
    }

    fn no_locator() -> Arc<FakeLocator> {
        Arc::new(FakeLocator {
            supported: false,
            ..FakeLocator::new(Err(GeolocationError::Unsupported))
        })
    }

    fn app_with(
        provider: Arc<FakeProvider>,
        store: Arc<MemoryStore>,
        locator: Arc<FakeLocator>,
    ) -> App {
        App::new(provider, store, locator, View::new(ICONS))
    }

    fn paris_provider() -> FakeProvider {
        FakeProvider::default().with_place("Paris", 14.7, "Paris")
    }

    fn shown_temperature(app: &App) -> Option<String> {
        match app.view().state() {
            ViewState::Result(r) => Some(r.current.temperature.clone()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn found_city_renders_and_is_remembered() {
        let provider = Arc::new(paris_provider());
        let store = Arc::new(MemoryStore::default());
        let app = app_with(provider.clone(), store.clone(), no_locator());

        let outcome = app.submit("  Paris ").await;

        assert_eq!(outcome, LookupOutcome::Rendered);
        assert_eq!(shown_temperature(&app).as_deref(), Some("15°C"));
        assert_eq!(store.load_last_city().unwrap().as_deref(), Some("Paris"));
        assert_eq!(provider.calls(), vec!["current:Paris", "forecast:Paris"]);
    }

    #[tokio::test]
    async fn not_found_shows_error_and_skips_forecast_and_store() {
        let provider = Arc::new(paris_provider());
        let store = Arc::new(MemoryStore::default());
        let app = app_with(provider.clone(), store.clone(), no_locator());

        let outcome = app.submit("Atlantis").await;

        assert_eq!(outcome, LookupOutcome::NotFound);
        assert_eq!(app.view().state(), &ViewState::Error);
        assert_eq!(store.write_count(), 0);
        assert_eq!(provider.calls(), vec!["current:Atlantis"]);
    }

    #[tokio::test]
    async fn forecast_failure_shows_error() {
        let provider = Arc::new(FakeProvider { forecast_fails: true, ..paris_provider() });
        let store = Arc::new(MemoryStore::default());
        let app = app_with(provider, store.clone(), no_locator());

        assert_eq!(app.submit("Paris").await, LookupOutcome::Failed);
        assert_eq!(app.view().state(), &ViewState::Error);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let provider = Arc::new(paris_provider());
        let app = app_with(provider.clone(), Arc::new(MemoryStore::default()), no_locator());
        app.submit("Paris").await;
        let before = app.view().state().clone();

        assert_eq!(app.submit("   ").await, LookupOutcome::Rejected);
        assert_eq!(app.submit("").await, LookupOutcome::Rejected);

        let view = app.view();
        assert_eq!(view.state(), &before);
        assert_eq!(view.prompt.as_deref(), Some(EMPTY_INPUT_PROMPT));
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn startup_resumes_remembered_city() {
        let store = Arc::new(MemoryStore::default());
        let first = app_with(Arc::new(paris_provider()), store.clone(), no_locator());
        first.submit("Paris").await;

        let reloaded = app_with(Arc::new(paris_provider()), store, no_locator());
        let outcome = reloaded.startup().await;

        assert_eq!(outcome, Some(LookupOutcome::Rendered));
        let view = reloaded.view();
        assert_eq!(view.input, "Paris");
        assert_eq!(shown_temperature(&reloaded).as_deref(), Some("15°C"));
    }

    #[tokio::test]
    async fn startup_without_city_stays_initial_and_focuses() {
        let provider = Arc::new(paris_provider());
        let app = app_with(provider.clone(), Arc::new(MemoryStore::default()), no_locator());

        assert_eq!(app.startup().await, None);

        let view = app.view();
        assert_eq!(view.state(), &ViewState::Initial);
        assert!(view.focused);
        assert!(view.input.is_empty());
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn locate_uses_same_pipeline_and_fills_input() {
        let coords = Coordinates { lat: 48.85, lon: 2.35 };
        let provider = Arc::new(FakeProvider::default().with_place("48.85,2.35", 14.7, "Paris"));
        let store = Arc::new(MemoryStore::default());
        let locator = Arc::new(FakeLocator::new(Ok(coords)));
        let app = app_with(provider, store.clone(), locator);

        let by_position = app.locate().await;

        assert_eq!(by_position, LookupOutcome::Rendered);
        let view = app.view();
        assert_eq!(view.input, "Paris");
        assert_eq!(store.load_last_city().unwrap().as_deref(), Some("Paris"));

        let by_name = app_with(Arc::new(paris_provider()), Arc::new(MemoryStore::default()), no_locator());
        by_name.submit("Paris").await;
        assert_eq!(view.state(), by_name.view().state());
    }

    #[tokio::test]
    async fn locate_unsupported_never_loads() {
        let provider = Arc::new(paris_provider());
        let app = app_with(provider.clone(), Arc::new(MemoryStore::default()), no_locator());

        assert_eq!(app.locate().await, LookupOutcome::Rejected);

        let view = app.view();
        assert_eq!(view.state(), &ViewState::Initial);
        assert_eq!(view.prompt.as_deref(), Some(GEOLOCATION_UNSUPPORTED_PROMPT));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn locate_denied_clears_loading_without_fallback() {
        let provider = Arc::new(paris_provider());
        let locator = Arc::new(FakeLocator::new(Err(GeolocationError::Denied(
            "blocked".into(),
        ))));
        let app = app_with(provider.clone(), Arc::new(MemoryStore::default()), locator);

        assert_eq!(app.locate().await, LookupOutcome::Rejected);

        let view = app.view();
        assert_eq!(view.state(), &ViewState::Initial);
        assert_eq!(view.prompt.as_deref(), Some(GEOLOCATION_FAILED_PROMPT));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn stale_lookup_does_not_overwrite_newer_result() {
        let provider = Arc::new(
            paris_provider().with_place("Slowtown", -3.0, "Slowtown").with_delay("Slowtown", 100),
        );
        let store = Arc::new(MemoryStore::default());
        let app = app_with(provider, store.clone(), no_locator());

        let (slow, fast) = tokio::join!(app.submit("Slowtown"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            app.submit("Paris").await
        });

        assert_eq!(slow, LookupOutcome::Stale);
        assert_eq!(fast, LookupOutcome::Rendered);
        assert_eq!(shown_temperature(&app).as_deref(), Some("15°C"));
        assert_eq!(store.load_last_city().unwrap().as_deref(), Some("Paris"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn current_failure_shows_error_without_forecast() {
        let provider = Arc::new(FakeProvider {
            current_fails: true,
            ..paris_provider()
        });
        let store = Arc::new(MemoryStore::default());
        let app = app_with(provider.clone(), store.clone(), no_locator());

        assert_eq!(app.submit("Paris").await, LookupOutcome::Failed);
        assert_eq!(app.view().state(), &ViewState::Error);
        assert_eq!(store.write_count(), 0);
        assert_eq!(provider.calls(), vec!["current:Paris"]);
    }

    #[tokio::test]
    async fn search_during_locate_makes_locate_stale() {
        let coords = Coordinates { lat: 59.91, lon: 10.75 };
        let provider = Arc::new(paris_provider().with_place("59.91,10.75", -4.0, "Oslo"));
        let store = Arc::new(MemoryStore::default());
        let locator = Arc::new(FakeLocator {
            delay_ms: 100,
            ..FakeLocator::new(Ok(coords))
        });
        let app = app_with(provider.clone(), store.clone(), locator);

        let (located, searched) = tokio::join!(app.locate(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            app.submit("Paris").await
        });

        assert_eq!(located, LookupOutcome::Stale);
        assert_eq!(searched, LookupOutcome::Rendered);
        let view = app.view();
        assert_eq!(view.input, "Paris");
        assert_eq!(shown_temperature(&app).as_deref(), Some("15°C"));
        assert_eq!(store.load_last_city().unwrap().as_deref(), Some("Paris"));
        assert_eq!(store.write_count(), 1);
        assert_eq!(provider.calls(), vec!["current:Paris", "forecast:Paris"]);
    }
}

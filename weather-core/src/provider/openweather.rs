use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::LookupError,
    model::{CurrentWeatherReading, ForecastDay, Query},
};

use super::WeatherProvider;

/// Label OpenWeather puts on the noon sample of each forecast day.
const NOON_LABEL: &str = "12:00:00";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    current_url: Url,
    forecast_url: Url,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String, base_url: &str) -> anyhow::Result<Self> {
        let base = base_url.trim_end_matches('/');
        let current_url = Url::parse(&format!("{base}/weather"))
            .with_context(|| format!("Invalid provider base URL: {base_url}"))?;
        let forecast_url = Url::parse(&format!("{base}/forecast"))
            .with_context(|| format!("Invalid provider base URL: {base_url}"))?;

        Ok(Self {
            api_key,
            current_url,
            forecast_url,
            http: Client::new(),
        })
    }

    async fn get(&self, url: &Url, query: &Query) -> Result<(StatusCode, String), LookupError> {
        let mut params = query.location_params();
        params.push(("appid", self.api_key.clone()));
        params.push(("units", "metric".to_string()));

        tracing::debug!(%url, %query, "requesting");

        let res = self
            .http
            .get(url.clone())
            .query(&params)
            .send()
            .await
            .map_err(|e| LookupError::Transport(format!("request to {url} failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| LookupError::Transport(format!("failed to read body from {url}: {e}")))?;

        Ok((status, body))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch_current(&self, query: &Query) -> Result<CurrentWeatherReading, LookupError> {
        let (status, body) = self.get(&self.current_url, query).await?;
        parse_current(status, &body)
    }

    async fn fetch_forecast(&self, query: &Query) -> Result<Vec<ForecastDay>, LookupError> {
        let (status, body) = self.get(&self.forecast_url, query).await?;

        if !status.is_success() {
            return Err(LookupError::Transport(format!(
                "forecast request failed with status {status}: {}",
                truncate_body(&body)
            )));
        }

        parse_forecast(&body)
    }
}

#[derive(Debug, Deserialize)]
struct OwEnvelope {
    #[serde(default)]
    cod: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    #[serde(default)]
    sys: OwSys,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    dt_txt: String,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

fn parse_current(status: StatusCode, body: &str) -> Result<CurrentWeatherReading, LookupError> {
    // The provider reports unknown places through `cod`, sometimes as a string.
    // A 404 without that field comes from something other than the provider.
    let envelope: Option<OwEnvelope> = serde_json::from_str(body).ok();
    let cod_not_found = envelope.and_then(|e| e.cod).is_some_and(|cod| is_not_found(&cod));

    if cod_not_found {
        return Err(LookupError::NotFound);
    }

    if !status.is_success() {
        return Err(LookupError::Transport(format!(
            "current request failed with status {status}: {}",
            truncate_body(body)
        )));
    }

    let parsed: OwCurrentResponse = serde_json::from_str(body)
        .map_err(|e| LookupError::Transport(format!("malformed current weather JSON: {e}")))?;

    let (description, icon_code) = first_condition(parsed.weather);

    Ok(CurrentWeatherReading {
        location_name: parsed.name,
        country_code: parsed.sys.country,
        temperature_c: parsed.main.temp,
        feels_like_c: parsed.main.feels_like,
        humidity_pct: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        description,
        icon_code,
    })
}

fn parse_forecast(body: &str) -> Result<Vec<ForecastDay>, LookupError> {
    let parsed: OwForecastResponse = serde_json::from_str(body)
        .map_err(|e| LookupError::Transport(format!("malformed forecast JSON: {e}")))?;

    parsed
        .list
        .into_iter()
        .filter(|entry| entry.dt_txt.contains(NOON_LABEL))
        .map(|entry| {
            let day_label = DateTime::from_timestamp(entry.dt, 0)
                .map(|t| t.format("%a").to_string())
                .ok_or_else(|| {
                    LookupError::Transport(format!("forecast timestamp out of range: {}", entry.dt))
                })?;
            let (description, icon_code) = first_condition(entry.weather);

            Ok(ForecastDay {
                day_label,
                icon_code,
                description,
                temperature_c: entry.main.temp,
            })
        })
        .collect()
}

fn is_not_found(cod: &Value) -> bool {
    match cod {
        Value::Number(n) => n.as_i64() == Some(404),
        Value::String(s) => s.trim() == "404",
        _ => false,
    }
}

fn first_condition(weather: Vec<OwWeather>) -> (String, String) {
    weather
        .into_iter()
        .next()
        .map(|w| (w.description, w.icon))
        .unwrap_or_else(|| ("Unknown".to_string(), String::new()))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

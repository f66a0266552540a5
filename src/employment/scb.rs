//! SCB PxWeb client
//!
//! Employment counts per occupation are published in the SCB tables
//! `AM0208E/YREG51BAS` (SSYK 2012) and `AM0208E/YREG33` (SSYK 1996). A pull
//! reads the table metadata, selects every occupation for the requested
//! years, and posts a JSON query.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::employment::{EmploymentProvider, EmploymentTable, FetchFuture, YearSelection};
use crate::error::{DaioeError, Result};
use crate::taxonomy::{Level, OccupationCode, Taxonomy};

const USER_AGENT: &str = concat!("daioe-explorer/", env!("CARGO_PKG_VERSION"));

/// Table metadata returned by `GET <table url>`
#[derive(Debug, Clone, Deserialize)]
pub struct TableMetadata {
    #[serde(default)]
    pub title: String,
    pub variables: Vec<Variable>,
}

/// One dimension of a PxWeb table
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub code: String,
    #[serde(default)]
    pub text: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub value_texts: Vec<String>,
    /// The variable may be left out of a query
    #[serde(default)]
    pub elimination: bool,
    #[serde(default)]
    pub time: bool,
}

impl Variable {
    fn is_time(&self) -> bool {
        self.time || self.code.eq_ignore_ascii_case("tid") || self.text.eq_ignore_ascii_case("year")
    }
}

/// Body of a PxWeb data query
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryBody {
    pub query: Vec<QuerySelection>,
    pub response: ResponseFormat,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuerySelection {
    pub code: String,
    pub selection: Selection,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Selection {
    pub filter: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseFormat {
    pub format: String,
}

/// Data returned by `POST <table url>`
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse {
    pub columns: Vec<Column>,
    pub data: Vec<DataRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Column {
    pub code: String,
    #[serde(default)]
    pub text: String,
    /// `d` dimension, `t` time, `c` content
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataRow {
    pub key: Vec<String>,
    pub values: Vec<String>,
}

/// A planned query: the body plus the variable codes needed to read the answer
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub body: QueryBody,
    pub occupation_code: String,
    pub time_code: String,
    pub years: Vec<i32>,
}

/// Build the data query for all occupations in the selected years.
///
/// The first variable of an SCB occupation table is the occupation. Other
/// variables that cannot be eliminated are fixed to their first value.
pub fn plan_query(metadata: &TableMetadata, years: &YearSelection) -> Result<QueryPlan> {
    let occupation = metadata
        .variables
        .first()
        .ok_or_else(|| DaioeError::data_source("table metadata lists no variables"))?;
    let time = metadata
        .variables
        .iter()
        .find(|v| v.is_time())
        .ok_or_else(|| DaioeError::data_source("table metadata has no time variable"))?;

    let available: Vec<i32> = time
        .values
        .iter()
        .filter_map(|y| y.trim().parse().ok())
        .collect();
    if available.is_empty() {
        return Err(DaioeError::data_source(
            "table metadata did not provide any valid years",
        ));
    }
    let selected = years.select(&available);
    if selected.is_empty() {
        return Err(DaioeError::data_source(format!(
            "none of the requested years are available (available: {}..={})",
            available.iter().min().unwrap_or(&0),
            available.iter().max().unwrap_or(&0)
        )));
    }

    let item = |code: &str, values: Vec<String>| QuerySelection {
        code: code.to_string(),
        selection: Selection {
            filter: "item".to_string(),
            values,
        },
    };

    let mut query = vec![
        item(&occupation.code, occupation.values.clone()),
        item(&time.code, selected.iter().map(i32::to_string).collect()),
    ];
    for variable in &metadata.variables {
        if variable.code == occupation.code || variable.code == time.code || variable.elimination {
            continue;
        }
        if let Some(first) = variable.values.first() {
            log::debug!("Fixing SCB variable {} to {}", variable.code, first);
            query.push(item(&variable.code, vec![first.clone()]));
        }
    }

    Ok(QueryPlan {
        body: QueryBody {
            query,
            response: ResponseFormat {
                format: "json".to_string(),
            },
        },
        occupation_code: occupation.code.clone(),
        time_code: time.code.clone(),
        years: selected,
    })
}

/// Parse an SCB cell; suppressed or missing markers (`..`, `-`) are `None`.
#[must_use]
pub fn parse_count(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

/// Turn a data response into an employment table.
///
/// Codes listed in `excluded` are dropped; every other code must be a
/// 4-digit occupation, and every (code, year) pair may appear only once.
pub fn parse_response(
    taxonomy: Taxonomy,
    response: &DataResponse,
    plan: &QueryPlan,
    excluded: &[String],
) -> Result<EmploymentTable> {
    // Keys hold the dimension and time columns in column order
    let key_columns: Vec<&Column> = response.columns.iter().filter(|c| c.kind != "c").collect();
    let position = |code: &str| {
        key_columns
            .iter()
            .position(|c| c.code == code)
            .ok_or_else(|| DaioeError::data_source(format!("response has no '{code}' column")))
    };
    let occupation_idx = position(&plan.occupation_code)?;
    let time_idx = position(&plan.time_code)?;

    let mut table = EmploymentTable::new(taxonomy);
    for row in &response.data {
        let (Some(raw_code), Some(raw_year)) = (row.key.get(occupation_idx), row.key.get(time_idx)) else {
            return Err(DaioeError::data_source(format!(
                "data row has a short key: {:?}",
                row.key
            )));
        };
        if excluded.iter().any(|e| e == raw_code) {
            continue;
        }

        let code = OccupationCode::at_level(raw_code, Level::Four)?;
        let year: i32 = raw_year.trim().parse().map_err(|_| {
            DaioeError::aggregation_data(format!("{taxonomy} employment ({code}, {raw_year})"), "invalid year")
        })?;
        let count = row.values.first().and_then(|v| parse_count(v));
        table.insert(code, year, count)?;
    }

    if table.is_empty() {
        return Err(DaioeError::data_source(format!(
            "SCB returned no data for taxonomy '{taxonomy}'"
        )));
    }
    Ok(table)
}

/// Client for the SCB PxWeb API
#[derive(Debug, Clone)]
pub struct ScbClient {
    http: reqwest::Client,
    base_url: String,
    language: String,
    excluded: Vec<String>,
}

impl ScbClient {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DaioeError::data_source_with("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: config.scb_base_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            excluded: config.excluded_codes.clone(),
        })
    }

    /// URL of the employment table for `taxonomy`
    #[must_use]
    pub fn table_url(&self, taxonomy: Taxonomy) -> String {
        let table = taxonomy.scb_table();
        format!(
            "{}/{}/ssd/{}/{}",
            self.base_url,
            self.language,
            table.path.join("/"),
            table.table
        )
    }

    async fn metadata(&self, url: &str) -> Result<TableMetadata> {
        log::debug!("Fetching SCB table metadata from {url}");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn data(&self, url: &str, body: &QueryBody) -> Result<DataResponse> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch employment counts for `taxonomy`
    pub async fn fetch_table(&self, taxonomy: Taxonomy, years: &YearSelection) -> Result<EmploymentTable> {
        let url = self.table_url(taxonomy);
        let metadata = self.metadata(&url).await?;
        let plan = plan_query(&metadata, years)?;
        log::info!(
            "Requesting {} occupations for {:?} from SCB table {}",
            metadata.variables.first().map_or(0, |v| v.values.len()),
            plan.years,
            taxonomy.scb_table().table
        );

        let response = self.data(&url, &plan.body).await?;
        let table = parse_response(taxonomy, &response, &plan, &self.excluded)?;
        log::info!(
            "Received {} employment records ({} reported) for {taxonomy}",
            table.len(),
            table.reported()
        );
        Ok(table)
    }
}

impl EmploymentProvider for ScbClient {
    fn name(&self) -> &str {
        "scb"
    }

    fn fetch<'a>(&'a self, taxonomy: Taxonomy, years: &'a YearSelection) -> FetchFuture<'a> {
        Box::pin(self.fetch_table(taxonomy, years))
    }
}

//! The three enrichment jobs built on the batch driver
//!
//! - `Summarize`: experience account -> objective summary (one row)
//! - `ExtractArchetypes`: summary -> Jungian archetypes (fan-out, one row each)
//! - `FetchPage`: URL -> raw page text (one row)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::Operation;
use crate::dataset::{DatasetRecord, Tabular};
use crate::error::{Error, Result};
use crate::memo::CallArgs;
use crate::remote::{parse_json_reply, resolve_url, ChatModel, Fetcher};

const SUMMARIZE_PROMPT: &str = "\
Given a drug trip report, summarize the report in objective, clear language. \
Describe what the participant felt, saw and experienced, and whether they \
interacted with any other entities; if so, give each entity's detailed physical \
description, behaviour and communication. Do not leave any entity out and do \
not interpret the material. Never name the substance used, in any form; remove \
every reference to its identity. \
Reply with a JSON object: {\"reasoning\": string, \"summary\": string}.";

const ARCHETYPE_PROMPT: &str = "\
You will receive a summarized drug trip report. If the report includes specific \
entities that correspond roughly with Jungian archetypes, return those archetypes \
in a list. Do not interpret settings or moods as entities. Only include entities \
which appear explicitly in the account. Allowed values: self, shadow, anima, \
animus, persona, hero, wise_old_man, wise_old_woman, mother, child, trickster, \
lover, explorer, creator, destroyer, ruler, caregiver, rebel, orphan. \
Reply with a JSON object: {\"reasoning\": string, \"extracted\": [string]}.";

/// Model output for one summarized account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub reasoning: String,
    pub summary: String,
}

/// Jungian archetype labels accepted from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    #[serde(rename = "self")]
    SelfArchetype,
    Shadow,
    Anima,
    Animus,
    Persona,
    Hero,
    WiseOldMan,
    WiseOldWoman,
    Mother,
    Child,
    Trickster,
    Lover,
    Explorer,
    Creator,
    Destroyer,
    Ruler,
    Caregiver,
    Rebel,
    Orphan,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::SelfArchetype => "self",
            Archetype::Shadow => "shadow",
            Archetype::Anima => "anima",
            Archetype::Animus => "animus",
            Archetype::Persona => "persona",
            Archetype::Hero => "hero",
            Archetype::WiseOldMan => "wise_old_man",
            Archetype::WiseOldWoman => "wise_old_woman",
            Archetype::Mother => "mother",
            Archetype::Child => "child",
            Archetype::Trickster => "trickster",
            Archetype::Lover => "lover",
            Archetype::Explorer => "explorer",
            Archetype::Creator => "creator",
            Archetype::Destroyer => "destroyer",
            Archetype::Ruler => "ruler",
            Archetype::Caregiver => "caregiver",
            Archetype::Rebel => "rebel",
            Archetype::Orphan => "orphan",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model output for one archetype extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeExtraction {
    #[serde(default)]
    pub reasoning: String,
    pub extracted: Vec<Archetype>,
}

/// Fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub content: String,
}

/// Summarizes experience accounts
pub struct Summarize<'m, M> {
    model: &'m M,
}

impl<'m, M: ChatModel> Summarize<'m, M> {
    pub const NAME: &'static str = "summarize";

    pub fn new(model: &'m M) -> Self {
        Self { model }
    }
}

impl<M: ChatModel> Operation for Summarize<'_, M> {
    type Output = Summary;

    fn name(&self) -> &str {
        Self::NAME
    }

    fn call_args(&self, record: &DatasetRecord) -> CallArgs {
        CallArgs::new()
            .named("account", record.payload.as_str())
            .named("model", self.model.model())
    }

    fn invoke(&self, record: &DatasetRecord) -> Result<Summary> {
        let reply = self.model.complete(SUMMARIZE_PROMPT, &record.payload)?;
        parse_json_reply(&reply)
    }
}

/// Extracts archetypes from summaries
pub struct ExtractArchetypes<'m, M> {
    model: &'m M,
}

impl<'m, M: ChatModel> ExtractArchetypes<'m, M> {
    pub const NAME: &'static str = "archetype_extractor";

    pub fn new(model: &'m M) -> Self {
        Self { model }
    }
}

impl<M: ChatModel> Operation for ExtractArchetypes<'_, M> {
    type Output = ArchetypeExtraction;

    fn name(&self) -> &str {
        Self::NAME
    }

    fn call_args(&self, record: &DatasetRecord) -> CallArgs {
        CallArgs::new()
            .named("account", record.payload.as_str())
            .named("model", self.model.model())
    }

    fn invoke(&self, record: &DatasetRecord) -> Result<ArchetypeExtraction> {
        let reply = self.model.complete(ARCHETYPE_PROMPT, &record.payload)?;
        parse_json_reply(&reply)
    }
}

/// Fetches the page a record points at
pub struct FetchPage<'f, F> {
    fetcher: &'f F,
    base_url: Option<String>,
}

impl<'f, F: Fetcher> FetchPage<'f, F> {
    pub const NAME: &'static str = "fetch";

    pub fn new(fetcher: &'f F, base_url: Option<String>) -> Self {
        Self { fetcher, base_url }
    }

    fn url(&self, record: &DatasetRecord) -> String {
        resolve_url(self.base_url.as_deref(), &record.payload)
    }
}

impl<F: Fetcher> Operation for FetchPage<'_, F> {
    type Output = Page;

    fn name(&self) -> &str {
        Self::NAME
    }

    fn call_args(&self, record: &DatasetRecord) -> CallArgs {
        CallArgs::new().arg(self.url(record))
    }

    fn invoke(&self, record: &DatasetRecord) -> Result<Page> {
        let url = self.url(record);
        let content = self.fetcher.fetch(&url)?;
        Ok(Page { url, content })
    }
}

/// `summary` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub summary: String,
}

impl Tabular for SummaryRow {
    fn columns() -> Vec<&'static str> {
        vec!["summary"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.summary.clone()]
    }
}

/// `archetype` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchetypeRow {
    pub archetype: Archetype,
}

impl Tabular for ArchetypeRow {
    fn columns() -> Vec<&'static str> {
        vec!["archetype"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.archetype.to_string()]
    }
}

/// `url`, `content` columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRow {
    pub url: String,
    pub content: String,
}

impl Tabular for PageRow {
    fn columns() -> Vec<&'static str> {
        vec!["url", "content"]
    }

    fn cells(&self) -> Vec<String> {
        vec![self.url.clone(), self.content.clone()]
    }
}

/// One row per summary; an empty summary fails the record
pub fn emit_summary(summary: &Summary) -> Result<Vec<SummaryRow>> {
    let text = summary.summary.trim();
    if text.is_empty() {
        return Err(Error::Extract("model returned an empty summary".to_string()));
    }
    Ok(vec![SummaryRow {
        summary: text.to_string(),
    }])
}

/// One row per extracted archetype, in model order
pub fn emit_archetypes(extraction: &ArchetypeExtraction) -> Result<Vec<ArchetypeRow>> {
    Ok(extraction
        .extracted
        .iter()
        .map(|archetype| ArchetypeRow {
            archetype: *archetype,
        })
        .collect())
}

/// One row per fetched page
pub fn emit_page(page: &Page) -> Result<Vec<PageRow>> {
    Ok(vec![PageRow {
        url: page.url.clone(),
        content: page.content.clone(),
    }])
}

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;

use super::http::HttpClient;
use crate::config::Config;
use crate::error::Result;

const FEED_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: String,
    /// Chapter number as published; not unique across scanlation groups.
    pub number: Option<String>,
    pub title: Option<String>,
    pub volume: Option<String>,
    pub pages: usize,
    pub published_at: Option<DateTime<Utc>>,
    pub scanlation_group: Option<String>,
}

impl Chapter {
    pub fn label(&self) -> String {
        let number = self.number.as_deref().unwrap_or("?");
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => format!("Ch. {number} - {title}"),
            _ => format!("Ch. {number}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manga {
    pub id: String,
    pub title: String,
    pub author: String,
    pub artist: String,
    pub status: String,
    pub year: Option<u32>,
    pub description: String,
    pub tags: Vec<String>,
    pub cover_file: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MangaList {
    pub items: Vec<Manga>,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub group: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

impl PublicationStatus {
    pub const ALL: [PublicationStatus; 4] = [
        PublicationStatus::Ongoing,
        PublicationStatus::Completed,
        PublicationStatus::Hiatus,
        PublicationStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PublicationStatus::Ongoing => "ongoing",
            PublicationStatus::Completed => "completed",
            PublicationStatus::Hiatus => "hiatus",
            PublicationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demographic {
    Shounen,
    Shoujo,
    Seinen,
    Josei,
}

impl Demographic {
    pub const ALL: [Demographic; 4] = [
        Demographic::Shounen,
        Demographic::Shoujo,
        Demographic::Seinen,
        Demographic::Josei,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Demographic::Shounen => "shounen",
            Demographic::Shoujo => "shoujo",
            Demographic::Seinen => "seinen",
            Demographic::Josei => "josei",
        }
    }
}

impl fmt::Display for Demographic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a `/manga` listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct MangaSearch {
    pub title: Option<String>,
    pub status: Option<PublicationStatus>,
    pub demographic: Option<Demographic>,
    pub tags: Vec<String>,
    pub order: (String, String),
    pub limit: u32,
    pub offset: u32,
}

impl Default for MangaSearch {
    fn default() -> Self {
        Self {
            title: None,
            status: None,
            demographic: None,
            tags: Vec::new(),
            order: ("rating".to_string(), "desc".to_string()),
            limit: 20,
            offset: 0,
        }
    }
}

impl MangaSearch {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
            ("includes[]".to_string(), "cover_art".to_string()),
            ("hasAvailableChapters".to_string(), "true".to_string()),
        ];

        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("title".to_string(), title.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status[]".to_string(), status.as_str().to_string()));
        }
        if let Some(demographic) = self.demographic {
            pairs.push((
                "publicationDemographic[]".to_string(),
                demographic.as_str().to_string(),
            ));
        }
        for tag in &self.tags {
            pairs.push(("includedTags[]".to_string(), tag.clone()));
        }

        let (key, direction) = &self.order;
        pairs.push((format!("order[{key}]"), direction.clone()));
        pairs
    }
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    data: Vec<T>,
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct EntityEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct ChapterAttributes {
    chapter: Option<String>,
    title: Option<String>,
    volume: Option<String>,
    #[serde(default)]
    pages: usize,
    #[serde(rename = "publishAt", default)]
    publish_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AtHomeResponse {
    #[serde(rename = "baseUrl")]
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
    #[serde(rename = "dataSaver")]
    data_saver: Vec<String>,
}

/// Language-keyed strings in the order the API sent them. MangaDex encodes
/// an empty map as `[]`, which reads as no entries.
#[derive(Debug, Default, PartialEq)]
struct Localized(Vec<(String, String)>);

impl Localized {
    fn get(&self, lang: &str) -> Option<&String> {
        self.0.iter().find(|(l, _)| l == lang).map(|(_, text)| text)
    }

    fn first(&self) -> Option<&String> {
        self.0.first().map(|(_, text)| text)
    }
}

impl<'de> Deserialize<'de> for Localized {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LocalizedVisitor;

        impl<'de> Visitor<'de> for LocalizedVisitor {
            type Value = Localized;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of language codes to strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Localized, A::Error> {
                let mut entries = Vec::new();
                while let Some((lang, text)) = map.next_entry::<String, Option<String>>()? {
                    if let Some(text) = text {
                        entries.push((lang, text));
                    }
                }
                Ok(Localized(entries))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Localized, A::Error> {
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(1, &self));
                }
                Ok(Localized::default())
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Localized, E> {
                Ok(Localized::default())
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Localized, E> {
                Ok(Localized::default())
            }
        }

        deserializer.deserialize_any(LocalizedVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: Localized,
    status: Option<String>,
    year: Option<u32>,
    #[serde(default)]
    description: Localized,
    #[serde(default)]
    tags: Vec<TagData>,
}

#[derive(Debug, Deserialize)]
struct TagData {
    id: String,
    attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
struct TagAttributes {
    #[serde(default)]
    name: Localized,
    #[serde(default)]
    group: String,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
struct RelationshipAttributes {
    name: Option<String>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatisticsResponse {
    #[serde(default)]
    statistics: HashMap<String, MangaStatistics>,
}

#[derive(Debug, Deserialize)]
struct MangaStatistics {
    rating: Option<RatingStatistics>,
}

#[derive(Debug, Deserialize)]
struct RatingStatistics {
    average: Option<f64>,
}

fn related_attr<'a>(
    relationships: &'a [Relationship],
    rel_type: &str,
    pick: impl Fn(&'a RelationshipAttributes) -> Option<&'a String>,
) -> Option<&'a String> {
    relationships
        .iter()
        .filter(|r| r.rel_type == rel_type)
        .find_map(|r| r.attributes.as_ref().and_then(&pick))
}

fn pick_title(titles: &Localized) -> String {
    titles
        .get("en")
        .or_else(|| titles.get("ja-ro"))
        .or_else(|| titles.first())
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string())
}

fn parse_manga(m: MangaData) -> Manga {
    let author = related_attr(&m.relationships, "author", |a| a.name.as_ref())
        .cloned()
        .unwrap_or_default();
    let artist = related_attr(&m.relationships, "artist", |a| a.name.as_ref())
        .cloned()
        .unwrap_or_default();
    let cover_file = related_attr(&m.relationships, "cover_art", |a| a.file_name.as_ref()).cloned();

    let description = m
        .attributes
        .description
        .get("en")
        .or_else(|| m.attributes.description.get("ru"))
        .or_else(|| m.attributes.description.first())
        .cloned()
        .unwrap_or_default();

    let tags = m
        .attributes
        .tags
        .iter()
        .filter_map(|t| t.attributes.name.get("en").cloned())
        .collect();

    Manga {
        title: pick_title(&m.attributes.title),
        author,
        artist,
        status: m.attributes.status.unwrap_or_else(|| "unknown".to_string()),
        year: m.attributes.year,
        description,
        tags,
        cover_file,
        id: m.id,
    }
}

fn parse_chapter(c: ChapterData) -> Chapter {
    let scanlation_group =
        related_attr(&c.relationships, "scanlation_group", |a| a.name.as_ref()).cloned();

    Chapter {
        id: c.id,
        number: c.attributes.chapter,
        title: c.attributes.title,
        volume: c.attributes.volume,
        pages: c.attributes.pages,
        published_at: c.attributes.publish_at,
        scanlation_group,
    }
}

/// Read-only client for the MangaDex REST API.
#[derive(Clone)]
pub struct MangaDex {
    http: HttpClient,
    api_url: String,
    uploads_url: String,
    language: String,
    data_saver: bool,
}

impl MangaDex {
    pub fn new(http: HttpClient, config: &Config) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            uploads_url: config.uploads_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            data_saver: config.data_saver,
        }
    }

    pub fn cover_url(&self, manga: &Manga, size: u32) -> Option<String> {
        manga.cover_file.as_ref().map(|file| {
            format!("{}/covers/{}/{}.{}.jpg", self.uploads_url, manga.id, file, size)
        })
    }

    pub async fn get_latest(&self, limit: u32, offset: u32) -> Result<MangaList> {
        let url = format!("{}/manga", self.api_url);
        let query = [
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("order[latestUploadedChapter]", "desc".to_string()),
            ("includes[]", "cover_art".to_string()),
            ("contentRating[]", "safe".to_string()),
            ("contentRating[]", "suggestive".to_string()),
            ("hasAvailableChapters", "true".to_string()),
        ];

        let response: ListEnvelope<MangaData> = self
            .http
            .json("manga/latest", |c| c.get(&url).query(&query))
            .await?;

        Ok(MangaList {
            total: response.total,
            items: response.data.into_iter().map(parse_manga).collect(),
        })
    }

    pub async fn search(&self, search: &MangaSearch) -> Result<MangaList> {
        let url = format!("{}/manga", self.api_url);
        let query = search.query_pairs();

        let response: ListEnvelope<MangaData> = self
            .http
            .json("manga/search", |c| c.get(&url).query(&query))
            .await?;

        Ok(MangaList {
            total: response.total,
            items: response.data.into_iter().map(parse_manga).collect(),
        })
    }

    pub async fn get_manga(&self, manga_id: &str) -> Result<Manga> {
        let url = format!("{}/manga/{}", self.api_url, urlencoding::encode(manga_id));
        let query = [
            ("includes[]", "cover_art"),
            ("includes[]", "author"),
            ("includes[]", "artist"),
        ];

        let response: EntityEnvelope<MangaData> = self
            .http
            .json("manga/detail", |c| c.get(&url).query(&query))
            .await?;

        Ok(parse_manga(response.data))
    }

    /// Raw chapter feed in the configured language, newest chapter first.
    /// May hold several uploads of the same chapter number.
    pub async fn get_chapter_feed(&self, manga_id: &str) -> Result<Vec<Chapter>> {
        let url = format!("{}/manga/{}/feed", self.api_url, urlencoding::encode(manga_id));
        let query = [
            ("limit", FEED_LIMIT.to_string()),
            ("translatedLanguage[]", self.language.clone()),
            ("order[chapter]", "desc".to_string()),
            ("includes[]", "scanlation_group".to_string()),
        ];

        let response: ListEnvelope<ChapterData> = self
            .http
            .json("manga/feed", |c| c.get(&url).query(&query))
            .await?;

        Ok(response.data.into_iter().map(parse_chapter).collect())
    }

    pub async fn get_chapter_pages(&self, chapter_id: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/at-home/server/{}",
            self.api_url,
            urlencoding::encode(chapter_id)
        );

        let response: AtHomeResponse = self.http.json("at-home", |c| c.get(&url)).await?;
        Ok(page_urls(response, self.data_saver))
    }

    pub async fn get_tags(&self) -> Result<Vec<Tag>> {
        let url = format!("{}/manga/tag", self.api_url);
        let response: ListEnvelope<TagData> = self.http.json("manga/tag", |c| c.get(&url)).await?;

        Ok(response
            .data
            .into_iter()
            .map(|t| Tag {
                name: t
                    .attributes
                    .name
                    .get("en")
                    .cloned()
                    .unwrap_or_else(|| t.id.clone()),
                group: t.attributes.group,
                id: t.id,
            })
            .collect())
    }

    /// Genre tags sorted by name, as offered by the catalog filter.
    pub async fn get_genres(&self) -> Result<Vec<Tag>> {
        let mut genres: Vec<Tag> = self
            .get_tags()
            .await?
            .into_iter()
            .filter(|t| t.group == "genre")
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(genres)
    }

    /// Average community rating per manga id. Ids without ratings are absent.
    pub async fn get_statistics(&self, manga_ids: &[String]) -> Result<HashMap<String, f64>> {
        if manga_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/statistics/manga", self.api_url);
        let query: Vec<(&str, &str)> = manga_ids.iter().map(|id| ("manga[]", id.as_str())).collect();

        let response: StatisticsResponse = self
            .http
            .json("statistics", |c| c.get(&url).query(&query))
            .await?;

        Ok(response
            .statistics
            .into_iter()
            .filter_map(|(id, stats)| stats.rating.and_then(|r| r.average).map(|avg| (id, avg)))
            .collect())
    }

    pub async fn fetch_image(&self, url: &str) -> Option<DynamicImage> {
        let bytes = match self.http.bytes(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("image {url}: {e}");
                return None;
            }
        };

        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .decode()
            .ok()
    }
}

fn page_urls(response: AtHomeResponse, data_saver: bool) -> Vec<String> {
    let (bucket, files) = if data_saver {
        ("data-saver", response.chapter.data_saver)
    } else {
        ("data", response.chapter.data)
    };

    files
        .into_iter()
        .map(|filename| {
            format!(
                "{}/{}/{}/{}",
                response.base_url, bucket, response.chapter.hash, filename
            )
        })
        .collect()
}

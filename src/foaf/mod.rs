//! FOAF profile metadata.
//!
//! The FOAF endpoint serves RDF/XML documents describing a user or a
//! community, usually encoded as windows-1251. Documents are fetched with a
//! single GET through the shared [`HttpTransport`] and decoded with
//! `quick-xml`; the charset is taken from the XML declaration.

use crate::errors::{DecodeError, VkError, VkResult};
use crate::transport::{HttpTransport, RawRequest};
use chrono::{DateTime, FixedOffset};
use http::HeaderMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// FOAF endpoint
pub const FOAF_URL: &str = "https://vk.com/foaf.php";

/// Link to a blog or profile page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Weblog {
    /// Link title
    pub title: String,
    /// Link target
    pub resource: String,
}

/// City and country
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// City name
    pub city: Option<String>,
    /// Country name
    pub country: Option<String>,
}

/// User profile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    /// Whether the profile is public
    pub public_access: Option<String>,
    /// Profile state, such as `active` or `banned`
    pub profile_state: Option<String>,
    /// Full name
    pub name: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Screen name
    pub nick: Option<String>,
    /// Gender
    pub gender: Option<String>,
    /// Birth date, `DD-MM` or `YYYY-MM-DD`
    pub birthday: Option<String>,
    /// Profile link
    pub weblog: Option<Weblog>,
    /// Avatar URL
    pub image: Option<String>,
    /// Registration date
    pub created: Option<DateTime<FixedOffset>>,
    /// Last login date
    pub last_logged_in: Option<DateTime<FixedOffset>>,
    /// Last profile change
    pub modified: Option<DateTime<FixedOffset>>,
    /// Followers
    pub subscribers_count: Option<u64>,
    /// Friends
    pub friends_count: Option<u64>,
    /// Followed profiles
    pub subscribed_to_count: Option<u64>,
    /// Location
    pub location: Option<Location>,
    /// Personal site
    pub homepage: Option<String>,
    /// Interests
    pub interests: Vec<String>,
}

/// Community profile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    /// Community name
    pub name: Option<String>,
    /// Screen name
    pub nick: Option<String>,
    /// Community link
    pub weblog: Option<Weblog>,
    /// Avatar URL
    pub image: Option<String>,
    /// Creation date
    pub created: Option<DateTime<FixedOffset>>,
    /// Members
    pub subscribers_count: Option<u64>,
    /// Location
    pub location: Option<Location>,
}

/// Decoded RDF document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rdf {
    /// Document language (`xml:lang`)
    pub lang: Option<String>,
    /// User profile, if the document describes a user
    pub person: Option<Person>,
    /// Community profile, if the document describes a community
    pub group: Option<Group>,
}

enum Entity {
    Person(Person),
    Group(Group),
}

impl Entity {
    fn apply_text(&mut self, element: &str, text: String) {
        match self {
            Entity::Person(p) => match element {
                "publicAccess" => p.public_access = Some(text),
                "profileState" => p.profile_state = Some(text),
                "name" => p.name = Some(text),
                "firstName" => p.first_name = Some(text),
                "secondName" | "surname" | "lastName" => p.last_name = Some(text),
                "nick" => p.nick = Some(text),
                "gender" => p.gender = Some(text),
                "birthday" | "dateOfBirth" => p.birthday = Some(text),
                "subscribersCount" => p.subscribers_count = text.parse().ok(),
                "friendsCount" => p.friends_count = text.parse().ok(),
                "subscribedToCount" => p.subscribed_to_count = text.parse().ok(),
                "homepage" => p.homepage = Some(text),
                "interest" => p.interests.push(text),
                _ => {}
            },
            Entity::Group(g) => match element {
                "name" => g.name = Some(text),
                "nick" => g.nick = Some(text),
                "subscribersCount" => g.subscribers_count = text.parse().ok(),
                _ => {}
            },
        }
    }

    fn apply_attributes(&mut self, element: &str, attrs: &[(String, String)]) {
        let attr = |name: &str| {
            attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        let date = || attr("date").and_then(|d| DateTime::parse_from_rfc3339(&d).ok());

        match element {
            "weblog" => {
                let weblog = Weblog {
                    title: attr("title").unwrap_or_default(),
                    resource: attr("resource").unwrap_or_default(),
                };
                match self {
                    Entity::Person(p) => p.weblog = Some(weblog),
                    Entity::Group(g) => g.weblog = Some(weblog),
                }
            }
            "location" => {
                let location = Location {
                    city: attr("city"),
                    country: attr("country"),
                };
                match self {
                    Entity::Person(p) => p.location = Some(location),
                    Entity::Group(g) => g.location = Some(location),
                }
            }
            "Image" => {
                let image = attr("about");
                match self {
                    Entity::Person(p) => p.image = image,
                    Entity::Group(g) => g.image = image,
                }
            }
            "created" => match self {
                Entity::Person(p) => p.created = date(),
                Entity::Group(g) => g.created = date(),
            },
            "lastLoggedIn" => {
                if let Entity::Person(p) = self {
                    p.last_logged_in = date();
                }
            }
            "modified" => {
                if let Entity::Person(p) = self {
                    p.modified = date();
                }
            }
            _ => {}
        }
    }
}

fn xml_error(err: impl std::fmt::Display) -> VkError {
    DecodeError::Xml {
        message: err.to_string(),
    }
    .into()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes<R>(e: &BytesStart<'_>, reader: &Reader<R>) -> VkResult<Vec<(String, String)>> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(reader)
                .map_err(xml_error)?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

/// Parse an RDF/XML document.
///
/// The encoding declared in the XML prolog is honored, so windows-1251
/// documents decode to proper UTF-8 strings.
pub fn parse_rdf(body: &[u8]) -> VkResult<Rdf> {
    let mut reader = Reader::from_reader(body);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rdf: Option<Rdf> = None;
    let mut entity: Option<Entity> = None;
    // Element names below the root
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                let attrs = attributes(&e, &reader)?;
                open_element(&mut rdf, &mut entity, &path, &name, &attrs)?;
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                let attrs = attributes(&e, &reader)?;
                open_element(&mut rdf, &mut entity, &path, &name, &attrs)?;
                if path.len() == 1 {
                    close_entity(&mut rdf, &mut entity);
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(current), Some(element)) = (entity.as_mut(), path.last()) {
                    if path.len() == 3 {
                        let text = e.unescape().map_err(xml_error)?.into_owned();
                        current.apply_text(element, text);
                    }
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
                if path.len() == 1 {
                    close_entity(&mut rdf, &mut entity);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    rdf.ok_or_else(|| {
        DecodeError::Xml {
            message: "document has no RDF root element".to_string(),
        }
        .into()
    })
}

fn open_element(
    rdf: &mut Option<Rdf>,
    entity: &mut Option<Entity>,
    path: &[String],
    name: &str,
    attrs: &[(String, String)],
) -> VkResult<()> {
    match path.len() {
        0 => {
            if name != "RDF" {
                return Err(xml_error(format!("unexpected root element '{}'", name)));
            }
            *rdf = Some(Rdf {
                lang: attrs
                    .iter()
                    .find(|(k, _)| k == "lang")
                    .map(|(_, v)| v.clone()),
                ..Rdf::default()
            });
        }
        1 => {
            *entity = match name {
                "Person" => Some(Entity::Person(Person::default())),
                "Group" => Some(Entity::Group(Group::default())),
                _ => None,
            };
        }
        _ => {
            if let Some(current) = entity.as_mut() {
                current.apply_attributes(name, attrs);
            }
        }
    }
    Ok(())
}

fn close_entity(rdf: &mut Option<Rdf>, entity: &mut Option<Entity>) {
    if let (Some(rdf), Some(done)) = (rdf.as_mut(), entity.take()) {
        match done {
            Entity::Person(p) => rdf.person = Some(p),
            Entity::Group(g) => rdf.group = Some(g),
        }
    }
}

/// Fetches FOAF documents.
///
/// Failures are returned as-is; FOAF requests bypass the retry
/// orchestrator and the rate governor.
#[derive(Clone)]
pub struct FoafClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    timeout: Option<Duration>,
}

impl FoafClient {
    /// Create a client for the public FOAF endpoint
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: FOAF_URL.to_string(),
            timeout: None,
        }
    }

    /// Use a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fetch and decode the document at `url`
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> VkResult<Rdf> {
        let mut request = RawRequest::get(url, HeaderMap::new());
        if let Some(timeout) = self.timeout {
            request = request.with_timeout(timeout);
        }

        let body = self.transport.send_raw(request).await?;
        debug!(body_len = body.len(), "Received FOAF document");
        parse_rdf(&body)
    }

    /// Fetch a user profile
    pub async fn fetch_person(&self, user_id: i64) -> VkResult<Person> {
        let rdf = self.fetch(&self.profile_url(user_id)).await?;
        rdf.person.ok_or_else(|| missing("Person"))
    }

    /// Fetch a community profile; the sign of `group_id` is ignored
    pub async fn fetch_group(&self, group_id: i64) -> VkResult<Group> {
        let rdf = self.fetch(&self.profile_url(-group_id.abs())).await?;
        rdf.group.ok_or_else(|| missing("Group"))
    }

    fn profile_url(&self, id: i64) -> String {
        format!("{}?id={}", self.base_url, id)
    }
}

fn missing(element: &str) -> VkError {
    DecodeError::UnexpectedEnvelope {
        message: format!("FOAF document has no {} element", element),
    }
    .into()
}

impl std::fmt::Debug for FoafClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoafClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::mocks::{MockFailure, MockHttpTransport, MockResponse};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_person_windows_1251() {
        let rdf = parse_rdf(&fixtures::foaf_person_xml()).unwrap();
        assert_eq!(rdf.lang.as_deref(), Some("ru"));
        assert!(rdf.group.is_none());

        let person = rdf.person.unwrap();
        assert_eq!(person.first_name.as_deref(), Some("Павел"));
        assert_eq!(person.last_name.as_deref(), Some("Дуров"));
        assert_eq!(person.name.as_deref(), Some("Павел Дуров"));
        assert_eq!(person.nick.as_deref(), Some("durov"));
        assert_eq!(person.gender.as_deref(), Some("male"));
        assert_eq!(person.birthday.as_deref(), Some("10-10"));
        assert_eq!(person.subscribers_count, Some(9_000_000));
        assert_eq!(person.friends_count, Some(0));
        assert_eq!(person.subscribed_to_count, Some(12));
        assert_eq!(
            person.weblog,
            Some(Weblog {
                title: String::new(),
                resource: "https://vk.com/id1".to_string(),
            })
        );
        assert_eq!(
            person.location,
            Some(Location {
                city: Some("Санкт-Петербург".to_string()),
                country: Some("Россия".to_string()),
            })
        );
        assert_eq!(person.image.as_deref(), Some("https://sun.userapi.com/photo.jpg"));
        assert_eq!(person.interests, vec!["Музыка", "Путешествия"]);
        assert_eq!(
            person.created.map(|d| d.to_rfc3339()),
            Some("2006-09-23T20:27:12+03:00".to_string())
        );
        assert!(person.last_logged_in.is_some());
        assert!(person.modified.is_some());
    }

    #[test]
    fn test_parse_group() {
        let rdf = parse_rdf(&fixtures::foaf_group_xml()).unwrap();
        let group = rdf.group.unwrap();

        assert_eq!(group.name.as_deref(), Some("Команда ВКонтакте"));
        assert_eq!(group.nick.as_deref(), Some("team"));
        assert_eq!(group.subscribers_count, Some(5_000_000));
        assert_eq!(group.weblog.unwrap().title, "Команда");
        assert_eq!(group.image.as_deref(), Some("https://sun.userapi.com/team.jpg"));
        assert!(group.created.is_some());
        assert!(rdf.person.is_none());
    }

    #[test]
    fn test_parse_utf8_without_declaration() {
        let body = "<RDF><Person><firstName>Иван</firstName></Person></RDF>";
        let person = parse_rdf(body.as_bytes()).unwrap().person.unwrap();
        assert_eq!(person.first_name.as_deref(), Some("Иван"));
    }

    #[test]
    fn test_parse_rejects_other_roots() {
        assert!(matches!(
            parse_rdf(b"<html><body/></html>"),
            Err(VkError::Decode(DecodeError::Xml { .. }))
        ));
        assert!(parse_rdf(b"").is_err());
    }

    #[tokio::test]
    async fn test_fetch_person_builds_url() {
        let transport = MockHttpTransport::new()
            .add_response(MockResponse::ok(fixtures::foaf_person_xml()))
            .shared();
        let client = FoafClient::new(transport.clone());

        let person = client.fetch_person(1).await.unwrap();

        assert_eq!(person.nick.as_deref(), Some("durov"));
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.url, "https://vk.com/foaf.php?id=1");
    }

    #[tokio::test]
    async fn test_fetch_group_uses_negative_id() {
        let transport = MockHttpTransport::new()
            .add_response(MockResponse::ok(fixtures::foaf_group_xml()))
            .shared();
        let client = FoafClient::new(transport.clone());

        client.fetch_group(22822305).await.unwrap();

        assert_eq!(
            transport.last_request().unwrap().url,
            "https://vk.com/foaf.php?id=-22822305"
        );
    }

    #[tokio::test]
    async fn test_fetch_does_not_retry() {
        let transport = MockHttpTransport::new()
            .add_response(MockResponse::failure(MockFailure::Status(502)))
            .shared();
        let client = FoafClient::new(transport.clone());

        assert!(client.fetch_person(1).await.is_err());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_person_from_group_document_fails() {
        let transport = MockHttpTransport::new()
            .add_response(MockResponse::ok(fixtures::foaf_group_xml()))
            .shared();
        let client = FoafClient::new(transport);

        assert!(matches!(
            client.fetch_person(1).await,
            Err(VkError::Decode(DecodeError::UnexpectedEnvelope { .. }))
        ));
    }
}

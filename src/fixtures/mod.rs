//! Test fixtures for VK API responses.
//!
//! Builds realistic response envelopes and FOAF documents for unit and
//! integration tests.

use serde_json::json;

/// `{"response": <payload>}` with `payload` given as raw JSON
pub fn success_body(payload: &str) -> String {
    format!(r#"{{"response":{}}}"#, payload)
}

/// Success body for `users.get` with a single user
pub fn users_get_body(id: i64, first_name: &str, last_name: &str) -> String {
    json!({
        "response": [{
            "id": id,
            "first_name": first_name,
            "last_name": last_name,
            "can_access_closed": true,
            "is_closed": false
        }]
    })
    .to_string()
}

/// Error envelope with the request parameters the API echoes back
pub fn error_body(code: i64, message: &str) -> String {
    json!({
        "error": {
            "error_code": code,
            "error_msg": message,
            "request_params": [
                {"key": "method", "value": "users.get"},
                {"key": "v", "value": "5.199"}
            ]
        }
    })
    .to_string()
}

/// Captcha challenge (error 14)
pub fn captcha_body(image_url: &str, session_id: &str) -> String {
    json!({
        "error": {
            "error_code": 14,
            "error_msg": "Captcha needed",
            "request_params": [{"key": "method", "value": "wall.post"}],
            "captcha_sid": session_id,
            "captcha_img": image_url
        }
    })
    .to_string()
}

/// Validation required (error 17)
pub fn validation_body(redirect_uri: &str) -> String {
    json!({
        "error": {
            "error_code": 17,
            "error_msg": "Validation required: please open redirect_uri in browser",
            "request_params": [],
            "redirect_uri": redirect_uri
        }
    })
    .to_string()
}

/// Confirmation required (error 24)
pub fn confirmation_body(text: &str) -> String {
    json!({
        "error": {
            "error_code": 24,
            "error_msg": "Confirmation required",
            "request_params": [],
            "confirmation_text": text
        }
    })
    .to_string()
}

/// Result of `execute` with one failed inner call
pub fn execute_body() -> String {
    json!({
        "response": [1, false],
        "execute_errors": [
            {"method": "wall.get", "error_code": 15, "error_msg": "Access denied: wall is disabled"}
        ]
    })
    .to_string()
}

/// Encode text as windows-1251, the charset the FOAF endpoint serves
pub fn to_cp1251(text: &str) -> Vec<u8> {
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(text);
    bytes.into_owned()
}

/// FOAF document for a user profile, windows-1251 encoded
pub fn foaf_person_xml() -> Vec<u8> {
    to_cp1251(
        r#"<?xml version="1.0" encoding="windows-1251"?>
<rdf:RDF xml:lang="ru"
 xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
 xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
 xmlns:foaf="http://xmlns.com/foaf/0.1/"
 xmlns:ya="http://blogs.yandex.ru/schema/foaf/"
 xmlns:img="http://blogs.yandex.ru/schema/foaf/img/"
 xmlns:dc="http://purl.org/dc/elements/1.1/">
 <foaf:Person>
  <ya:publicAccess>allowed</ya:publicAccess>
  <ya:profileState>active</ya:profileState>
  <foaf:weblog dc:title="" rdf:resource="https://vk.com/id1"/>
  <foaf:gender>male</foaf:gender>
  <ya:created dc:date="2006-09-23T20:27:12+03:00"/>
  <ya:lastLoggedIn dc:date="2024-03-01T10:00:00+03:00"/>
  <ya:modified dc:date="2023-12-31T23:59:59+03:00"/>
  <foaf:firstName>Павел</foaf:firstName>
  <foaf:secondName>Дуров</foaf:secondName>
  <foaf:name>Павел Дуров</foaf:name>
  <foaf:nick>durov</foaf:nick>
  <foaf:birthday>10-10</foaf:birthday>
  <ya:subscribersCount>9000000</ya:subscribersCount>
  <ya:friendsCount>0</ya:friendsCount>
  <ya:subscribedToCount>12</ya:subscribedToCount>
  <ya:location ya:city="Санкт-Петербург" ya:country="Россия"/>
  <foaf:homepage>https://t.me/durov</foaf:homepage>
  <foaf:interest>Музыка</foaf:interest>
  <foaf:interest>Путешествия</foaf:interest>
  <foaf:img>
   <foaf:Image rdf:about="https://sun.userapi.com/photo.jpg"/>
  </foaf:img>
 </foaf:Person>
</rdf:RDF>"#,
    )
}

/// FOAF document for a community, windows-1251 encoded
pub fn foaf_group_xml() -> Vec<u8> {
    to_cp1251(
        r#"<?xml version="1.0" encoding="windows-1251"?>
<rdf:RDF xml:lang="ru"
 xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
 xmlns:foaf="http://xmlns.com/foaf/0.1/"
 xmlns:ya="http://blogs.yandex.ru/schema/foaf/"
 xmlns:dc="http://purl.org/dc/elements/1.1/">
 <foaf:Group>
  <foaf:name>Команда ВКонтакте</foaf:name>
  <foaf:nick>team</foaf:nick>
  <foaf:weblog dc:title="Команда" rdf:resource="https://vk.com/team"/>
  <ya:created dc:date="2007-03-01T12:00:00+03:00"/>
  <ya:subscribersCount>5000000</ya:subscribersCount>
  <ya:location ya:city="Санкт-Петербург" ya:country="Россия"/>
  <foaf:img>
   <foaf:Image rdf:about="https://sun.userapi.com/team.jpg"/>
  </foaf:img>
 </foaf:Group>
</rdf:RDF>"#,
    )
}

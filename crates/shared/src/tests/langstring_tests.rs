use super::*;

#[test]
fn get_falls_back_to_first_language_then_plain() {
    let ls = LangString::new()
        .with(Language::De, "Haus")
        .with(Language::Fr, "maison");
    assert_eq!(ls.get(Language::Fr), Some("maison"));
    assert_eq!(ls.get(Language::En), Some("Haus"));
    assert_eq!(ls.get_exact(Language::En), None);

    let plain = LangString::plain("house");
    assert_eq!(plain.get(Language::It), Some("house"));
    assert_eq!(LangString::new().get(Language::En), None);
}

#[test]
fn get_default_prefers_plain_text() {
    let mut ls = LangString::new().with(Language::It, "casa");
    assert_eq!(ls.get_default(), Some("casa"));
    ls.set_plain("house");
    assert_eq!(ls.get_default(), Some("house"));
    assert_eq!(ls.get_exact(Language::It), None, "set_plain drops languages");
}

#[test]
fn remove_and_clear() {
    let mut ls = LangString::from_pairs([(Language::En, "a"), (Language::De, "b")]);
    assert_eq!(ls.remove(Language::En).as_deref(), Some("a"));
    assert_eq!(ls.remove(Language::En), None);
    assert!(!ls.is_empty());
    ls.clear();
    assert!(ls.is_empty());
}

#[test]
fn equality_covers_plain_and_languages() {
    let a = LangString::new().with(Language::En, "x").with(Language::De, "y");
    let b = LangString::new().with(Language::De, "y").with(Language::En, "x");
    assert_eq!(a, b);
    assert_ne!(a, b.clone().with(Language::De, "z"));
    assert_ne!(LangString::plain("x"), LangString::new().with(Language::En, "x"));
}

#[test]
fn admin_json_round_trips_languages() {
    let ls = LangString::new().with(Language::En, "Project").with(Language::De, "Projekt");
    let json = ls.to_admin_json().expect("non-empty");
    assert_eq!(
        json,
        json!([
            {"language": "en", "value": "Project"},
            {"language": "de", "value": "Projekt"}
        ])
    );
    assert_eq!(LangString::from_admin_json(&json).expect("parse"), ls);
}

#[test]
fn unknown_language_with_value_becomes_plain() {
    let ls = LangString::from_admin_json(&json!([{"value": "no lang"}])).expect("parse");
    assert_eq!(ls.get_plain(), Some("no lang"));

    let ls = LangString::from_admin_json(&json!([{"language": "rm", "value": "chasa"}]))
        .expect("parse");
    assert_eq!(ls.get_plain(), Some("chasa"));
}

#[test]
fn jsonld_accepts_single_object_and_string() {
    let ls = LangString::from_jsonld(&json!({"@language": "fr", "@value": "titre"})).expect("obj");
    assert_eq!(ls.get_exact(Language::Fr), Some("titre"));

    let ls = LangString::from_jsonld(&json!("just text")).expect("string");
    assert_eq!(ls.get_plain(), Some("just text"));
    assert_eq!(ls.to_jsonld(), Some(json!("just text")));
}

#[test]
fn empty_langstring_is_omitted() {
    assert_eq!(LangString::new().to_admin_json(), None);
    assert_eq!(LangString::new().to_jsonld(), None);
}

#[test]
fn malformed_input_is_rejected() {
    let err = LangString::from_admin_json(&json!(42)).expect_err("number");
    assert!(matches!(err, DomainError::MalformedLangString(_)));
}

#[test]
fn serde_uses_admin_form() {
    #[derive(Deserialize)]
    struct Holder {
        description: LangString,
    }
    let holder: Holder = serde_json::from_value(json!({
        "description": [{"language": "it", "value": "descrizione"}]
    }))
    .expect("deserialize");
    assert_eq!(holder.description.get(Language::En), Some("descrizione"));
    assert_eq!(
        serde_json::to_value(&holder.description).expect("serialize"),
        json!([{"language": "it", "value": "descrizione"}])
    );
}

#[test]
fn map_values_rewrites_every_entry() {
    let ls = LangString::plain("a \"b\"").map_values(|text| text.replace('"', "'"));
    assert_eq!(ls.get_plain(), Some("a 'b'"));
}

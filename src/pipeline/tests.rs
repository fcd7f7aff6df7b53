use super::*;

impl ParsedRecord {
    fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(number)) => Some(*number),
            _ => None,
        }
    }

    fn float(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Float(number)) => Some(*number),
            _ => None,
        }
    }

    fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(Value::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }
}

fn parse_one(kind: ParserKind, text: &str) -> ParsedRecord {
    let pipeline = Pipeline::for_kind(kind).unwrap();
    let mut records = pipeline.parse(&[SourceRow::new(1, text)], &References::new());
    assert_eq!(records.len(), 1);
    records.remove(0)
}

#[test]
fn summary_pipeline_extracts_car_attributes() {
    let record = parse_one(
        ParserKind::Summary,
        "Renault Clio 1.2 TCe Limited EDC 1197 cm3 • 120 KM • Renault Clio 1.2 TCe EDC",
    );

    assert_eq!(record.float("engine_cc"), Some(1197.0));
    assert_eq!(record.float("power_hp"), Some(120.0));
    assert_eq!(record.text("make"), Some("Renault"));
    assert_eq!(record.text("model"), Some("Clio"));
    assert_eq!(record.text("variant"), Some("1.2 TCe Limited EDC"));
    assert_eq!(record.get("description"), None);
}

#[test]
fn summary_without_bullet_leaves_buffer_as_description() {
    let record = parse_one(ParserKind::Summary, "Fiat Panda 1.2");

    assert_eq!(record.text("make"), Some("Fiat"));
    assert_eq!(record.text("model"), Some("Panda"));
    assert_eq!(record.get("variant"), None);
    assert_eq!(record.text("description"), Some("1.2"));
    assert_eq!(record.get("engine_cc"), None);
}

#[test]
fn summary_prefers_multi_word_make() {
    let record = parse_one(ParserKind::Summary, "Land Rover Discovery Sport");

    assert_eq!(record.text("make"), Some("Land Rover"));
    assert_eq!(record.text("model"), Some("Discovery"));
    assert_eq!(record.text("description"), Some("Sport"));
}

#[test]
fn summary_model_keeps_single_letter_suffix() {
    let record = parse_one(ParserKind::Summary, "Mercedes-Benz Klasa E 220 d");

    assert_eq!(record.text("make"), Some("Mercedes-Benz"));
    assert_eq!(record.text("model"), Some("Klasa E"));
    assert_eq!(record.text("description"), Some("220 d"));
}

#[test]
fn summary_normalizes_make_against_reference() {
    let pipeline = Pipeline::for_kind(ParserKind::Summary).unwrap();
    let rows = vec![SourceRow::new(1, "BMW X5"), SourceRow::new(2, "Bmw X3")];
    let mut references = References::new();
    references.insert("make", [("BMW".to_string(), 5)].into_iter().collect());

    let records = pipeline.parse(&rows, &references);

    assert_eq!(records[0].text("make"), Some("BMW"));
    assert_eq!(records[1].text("make"), Some("BMW"));
    assert_eq!(records[0].text("model"), Some("X5"));
    assert_eq!(records[1].text("model"), Some("X3"));
}

#[test]
fn details_pipeline_extracts_listing_attributes() {
    let record = parse_one(
        ParserKind::Details,
        "Podbite Zweryfikowane dane mileage 120 000 km fuel_type Benzyna gearbox Manualna \
         year 2015 Warszawa (Mazowieckie) () Opublikowano Prywatny sprzedawca \
         Usługi finansowe Kredyt online",
    );

    assert_eq!(record.flag("is_stamped"), Some(true));
    assert_eq!(record.flag("is_featured"), Some(false));
    assert_eq!(record.flag("is_verified"), Some(true));
    assert_eq!(record.integer("mileage"), Some(120_000));
    assert_eq!(record.text("fuel_type"), Some("Benzyna"));
    assert_eq!(record.text("gearbox_type"), Some("Manualna"));
    assert_eq!(record.integer("year"), Some(2015));
    assert_eq!(record.text("city"), Some("Warszawa"));
    assert_eq!(record.text("voivodeship"), Some("Mazowieckie"));
    assert_eq!(record.text("seller_info"), Some("Kredyt online"));
    assert_eq!(record.text("seller_type"), Some("Prywatny sprzedawca"));
}

#[test]
fn details_missing_markers_are_false_and_missing_values_null() {
    let record = parse_one(ParserKind::Details, "mileage 5 km");

    assert_eq!(record.flag("is_stamped"), Some(false));
    assert_eq!(record.flag("is_featured"), Some(false));
    assert_eq!(record.flag("is_verified"), Some(false));
    assert_eq!(record.integer("mileage"), Some(5));
    assert_eq!(record.get("year"), None);
    assert_eq!(record.get("city"), None);
    assert_eq!(record.get("seller_type"), None);
}

#[test]
fn price_pipeline_extracts_amount_and_currency() {
    let record = parse_one(ParserKind::Price, "120 000 zł Sprawdź możliwości finansowania");

    assert_eq!(record.integer("amount"), Some(120_000));
    assert_eq!(record.text("currency"), Some("zł"));
    assert_eq!(record.get("segment"), None);
}

#[test]
fn price_pipeline_drops_years_and_keeps_segment() {
    let record = parse_one(ParserKind::Price, "45 900 EUR Do negocjacji 2019");

    assert_eq!(record.integer("amount"), Some(45_900));
    assert_eq!(record.text("currency"), Some("EUR"));
    assert_eq!(record.text("segment"), Some("Do negocjacji"));
}

#[test]
fn missing_text_yields_record_with_null_fields() {
    let pipeline = Pipeline::for_kind(ParserKind::Summary).unwrap();
    let rows = vec![SourceRow { id: 7, text: None }, SourceRow::new(8, "")];

    let records = pipeline.parse(&rows, &References::new());

    assert_eq!(records.iter().map(|record| record.id).collect::<Vec<_>>(), vec![7, 8]);
    for record in &records {
        assert_eq!(record.fields.len(), pipeline.table().columns.len());
        assert!(record.fields.iter().all(|field| field.value.is_none()));
    }
}

#[test]
fn every_pipeline_fills_exactly_its_table_columns() {
    for kind in ParserKind::all() {
        let pipeline = Pipeline::for_kind(kind).unwrap();
        let record = parse_one(kind, "anything at all");

        let mut produced: Vec<&str> = record.fields.iter().map(|field| field.name).collect();
        let mut expected = pipeline.table().columns.to_vec();
        produced.sort_unstable();
        expected.sort_unstable();
        assert_eq!(produced, expected, "{}", kind.as_str());
        assert!(expected.contains(&pipeline.table().key_column));
    }
}

#[test]
fn extracted_fields_record_their_pattern() {
    let record = parse_one(ParserKind::Price, "9 000 zł");
    let amount = record
        .fields
        .iter()
        .find(|field| field.name == "amount")
        .unwrap();

    assert_eq!(amount.source_pattern.as_deref(), Some(r"([\d\s]+)"));
}

#[test]
fn only_summary_normalizes() {
    let summary = Pipeline::for_kind(ParserKind::Summary).unwrap();
    assert_eq!(summary.normalized_fields(), vec!["make", "model"]);

    assert!(Pipeline::for_kind(ParserKind::Details)
        .unwrap()
        .normalized_fields()
        .is_empty());
}

#[test]
fn validate_ids_reports_lost_records() {
    let input: Vec<SourceRow> = (1..=15).map(|id| SourceRow::new(id, "x")).collect();
    let output = vec![ParsedRecord::new(3)];

    let error = validate_ids(&input, &output).unwrap_err();
    assert_eq!(error.count, 14);
    assert_eq!(error.sample, vec![1, 2, 4, 5, 6, 7, 8, 9, 10, 11]);

    let all: Vec<ParsedRecord> = (1..=15).map(ParsedRecord::new).collect();
    assert!(validate_ids(&input, &all).is_ok());
}

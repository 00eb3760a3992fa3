/// Raw field name → display label, as used in dropdowns and hover text.
///
/// The source spreadsheets carry mixed-language, abbreviated headers from
/// the Kriminalitätsatlas and the demographic extracts. Unmapped names pass
/// through unchanged.
const DISPLAY_LABELS: &[(&str, &str)] = &[
    // Offence groups (Kriminalitätsatlas)
    ("straftaten_insg", "Straftaten insgesamt"),
    ("raub", "Raub"),
    ("strassenraub", "Straßenraub, Handtaschenraub"),
    ("koerperverl_insg", "Körperverletzungen insgesamt"),
    ("gef_schwere_koerperverl", "Gefährliche und schwere Körperverletzung"),
    ("freiheitsberaubung", "Freiheitsberaubung, Nötigung, Bedrohung, Nachstellung"),
    ("diebstahl_insg", "Diebstahl insgesamt"),
    ("diebstahl_kfz", "Diebstahl von Kraftwagen"),
    ("diebstahl_aus_kfz", "Diebstahl an/aus Kfz"),
    ("fahrraddiebstahl", "Fahrraddiebstahl"),
    ("wohnraumeinbruch", "Wohnraumeinbruch"),
    ("branddelikte", "Branddelikte insgesamt"),
    ("sachbesch_insg", "Sachbeschädigung insgesamt"),
    ("sachbesch_graffiti", "Sachbeschädigung durch Graffiti"),
    ("rauschgiftdelikte", "Rauschgiftdelikte"),
    ("kieztaten", "Kieztaten"),
    // Demographics
    ("ew_insgesamt", "Total Population"),
    ("flaeche_km2", "Area in square kilometers"),
    ("ew_unter_6", "Population under 6"),
    ("ew_6_15", "Population 6-15"),
    ("ew_15_18", "Population 15-18"),
    ("ew_18_27", "Population 18-27"),
    ("ew_27_45", "Population 27-45"),
    ("ew_45_55", "Population 45-55"),
    ("ew_55_65", "Population 55-65"),
    ("ew_ab_65", "Population 65 and older"),
    // Amenities
    ("anz_bars", "Bars"),
    ("anz_restaurants", "Restaurants"),
    ("anz_schulen", "Schools"),
    ("anz_bahnhoefe", "Railway stations"),
];

/// Display label for a raw column name. Already-readable names and unknown
/// names are returned unchanged.
pub fn display_label(raw: &str) -> &str {
    DISPLAY_LABELS
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_raw_names() {
        assert_eq!(display_label("raub"), "Raub");
        assert_eq!(display_label("ew_insgesamt"), "Total Population");
    }

    #[test]
    fn passes_unknown_names_through() {
        assert_eq!(display_label("Raub"), "Raub");
        assert_eq!(display_label("some_new_field"), "some_new_field");
    }
}

use crate::host::HostLibrary;
use crate::model::{MANUAL_ORDER, OrderRule, SortKey};
use anyhow::{Result, bail};
use std::cmp::Ordering;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Month, PrimitiveDateTime};

const DATE_TIME_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
];

const DATE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[day]/[month]/[year]"),
];

/// One extracted comparison value. Parsed values order before raw text so
/// a mixed column still has a total, deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Timestamp(i64),
    Integer(i64),
    Text(String),
}

/// Applies the rule chain to the member sequence: the first rule is the
/// primary ordering, every further rule only breaks ties, and items equal
/// under all rules keep their incoming relative order.
pub fn sort_members(
    members: &[String],
    rules: &[OrderRule],
    host: &dyn HostLibrary,
) -> Result<Vec<String>> {
    let mut keys = Vec::with_capacity(rules.len());
    for rule in rules {
        // A ManualOrder link in a longer chain refines nothing.
        if rule.key == MANUAL_ORDER {
            continue;
        }
        let Some(key) = SortKey::resolve(&rule.key) else {
            bail!("unrecognized sort key \"{}\"", rule.key);
        };
        keys.push((key, rule.descending));
    }

    let mut decorated: Vec<(Vec<SortValue>, usize)> = members
        .iter()
        .enumerate()
        .map(|(index, member)| {
            let values = keys
                .iter()
                .map(|(key, _)| extract_value(host, member, *key))
                .collect();
            (values, index)
        })
        .collect();

    decorated.sort_by(|a, b| compare_chain(&a.0, &b.0, &keys));

    Ok(decorated
        .into_iter()
        .map(|(_, index)| members[index].clone())
        .collect())
}

fn compare_chain(
    a: &[SortValue],
    b: &[SortValue],
    keys: &[(SortKey, bool)],
) -> Ordering {
    for (index, (_, descending)) in keys.iter().enumerate() {
        let mut ordering = a[index].cmp(&b[index]);
        if *descending {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn extract_value(host: &dyn HostLibrary, member: &str, key: SortKey) -> SortValue {
    match key {
        SortKey::Property(property) => {
            let raw = host.file_property(member, property);
            if property.is_date_valued() {
                if let Some(timestamp) = parse_timestamp(&raw) {
                    return SortValue::Timestamp(timestamp);
                }
            }
            SortValue::Text(raw)
        }
        SortKey::Tag(tag) => {
            let raw = host.file_tag(member, tag);
            if tag.is_numeric() {
                return SortValue::Integer(raw.trim().parse().unwrap_or(0));
            }
            if tag.is_year_valued() {
                return SortValue::Text(year_key(&raw));
            }
            SortValue::Text(raw)
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    for format in DATE_TIME_FORMATS {
        if let Ok(value) = PrimitiveDateTime::parse(trimmed, format) {
            return Some(value.assume_utc().unix_timestamp());
        }
    }
    parse_date(trimmed).map(|date| date.midnight().assume_utc().unix_timestamp())
}

fn parse_date(raw: &str) -> Option<Date> {
    DATE_FORMATS
        .iter()
        .find_map(|format| Date::parse(raw, format).ok())
}

/// Synthesizes a chronologically ordered text key for year tags: a bare
/// four-digit year and a full date string both collapse to a zero-padded
/// day number, anything unparsable stays as the raw string.
fn year_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let (head, tail) = match trimmed.split_once(' ') {
        Some((head, tail)) => (head, Some(tail)),
        None => (trimmed, None),
    };

    let date = head
        .parse::<i32>()
        .ok()
        .and_then(|year| Date::from_calendar_date(year, Month::January, 1).ok())
        .or_else(|| parse_date(head));

    match date {
        Some(date) => {
            let key = format!("{:010}", date.to_julian_day());
            match tail {
                Some(tail) => format!("{key} {tail}"),
                None => key,
            }
        }
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PlaylistInfo;
    use crate::model::{FileProperty, TagField};
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::path::Path;

    #[derive(Default)]
    struct TagHost {
        properties: HashMap<(String, &'static str), String>,
        tags: HashMap<(String, &'static str), String>,
    }

    impl TagHost {
        fn with_tag(mut self, file: &str, tag: &'static str, value: &str) -> Self {
            self.tags
                .insert((file.to_string(), tag), value.to_string());
            self
        }

        fn with_property(mut self, file: &str, property: &'static str, value: &str) -> Self {
            self.properties
                .insert((file.to_string(), property), value.to_string());
            self
        }
    }

    impl HostLibrary for TagHost {
        fn playlists(&self) -> Vec<PlaylistInfo> {
            Vec::new()
        }

        fn query_members(&self, _path: &Path) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn write_members(&self, _path: &Path, _members: &[String]) -> Result<()> {
            Ok(())
        }

        fn file_property(&self, file: &str, property: FileProperty) -> String {
            let name = match property {
                FileProperty::DateAdded => "DateAdded",
                FileProperty::DateModified => "DateModified",
                FileProperty::LastPlayed => "LastPlayed",
                _ => "other",
            };
            self.properties
                .get(&(file.to_string(), name))
                .cloned()
                .unwrap_or_default()
        }

        fn file_tag(&self, file: &str, tag: TagField) -> String {
            let name = match tag {
                TagField::Year => "Year",
                TagField::TrackNo => "TrackNo",
                TagField::Album => "Album",
                TagField::Artist => "Artist",
                _ => "other",
            };
            self.tags
                .get(&(file.to_string(), name))
                .cloned()
                .unwrap_or_default()
        }
    }

    fn members(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn single_rule_sorts_ascending_and_descending() {
        let host = TagHost::default()
            .with_tag("a", "TrackNo", "3")
            .with_tag("b", "TrackNo", "1")
            .with_tag("c", "TrackNo", "2");
        let files = members(&["a", "b", "c"]);

        let asc = sort_members(&files, &[OrderRule::new("TrackNo", false)], &host).expect("sort");
        assert_eq!(asc, members(&["b", "c", "a"]));

        let desc = sort_members(&files, &[OrderRule::new("TrackNo", true)], &host).expect("sort");
        assert_eq!(desc, members(&["a", "c", "b"]));
    }

    #[test]
    fn tie_breakers_refine_without_disturbing_primary_order() {
        let host = TagHost::default()
            .with_tag("a", "Album", "X")
            .with_tag("b", "Album", "X")
            .with_tag("c", "Album", "A")
            .with_tag("a", "TrackNo", "1")
            .with_tag("b", "TrackNo", "2")
            .with_tag("c", "TrackNo", "9");
        let files = members(&["a", "b", "c"]);

        let sorted = sort_members(
            &files,
            &[
                OrderRule::new("Album", false),
                OrderRule::new("TrackNo", true),
            ],
            &host,
        )
        .expect("sort");
        assert_eq!(sorted, members(&["c", "b", "a"]));
    }

    #[test]
    fn equal_keys_keep_incoming_relative_order() {
        let host = TagHost::default()
            .with_tag("first", "Album", "Same")
            .with_tag("second", "Album", "Same")
            .with_tag("third", "Album", "Same");
        let files = members(&["first", "second", "third"]);

        let sorted =
            sort_members(&files, &[OrderRule::new("Album", false)], &host).expect("sort");
        assert_eq!(sorted, files);
    }

    #[test]
    fn date_properties_compare_chronologically() {
        // Lexically "2024-02-01" < "2024-10-05" holds, but "9:00" style
        // noise breaks lexical order; timestamps settle it.
        let host = TagHost::default()
            .with_property("a", "DateAdded", "2024-10-05 09:00:00")
            .with_property("b", "DateAdded", "2024-02-01 21:30:00")
            .with_property("c", "DateAdded", "2023-12-31");
        let files = members(&["a", "b", "c"]);

        let sorted =
            sort_members(&files, &[OrderRule::new("DateAdded", false)], &host).expect("sort");
        assert_eq!(sorted, members(&["c", "b", "a"]));
    }

    #[test]
    fn year_tags_accept_bare_years_and_full_dates() {
        let host = TagHost::default()
            .with_tag("a", "Year", "1994")
            .with_tag("b", "Year", "1989-06-15")
            .with_tag("c", "Year", "2001");
        let files = members(&["a", "b", "c"]);

        let sorted = sort_members(&files, &[OrderRule::new("Year", false)], &host).expect("sort");
        assert_eq!(sorted, members(&["b", "a", "c"]));
    }

    #[test]
    fn unparsable_numeric_tags_sort_as_zero() {
        let host = TagHost::default()
            .with_tag("a", "TrackNo", "7")
            .with_tag("b", "TrackNo", "not a number");
        let files = members(&["a", "b"]);

        let sorted =
            sort_members(&files, &[OrderRule::new("TrackNo", false)], &host).expect("sort");
        assert_eq!(sorted, members(&["b", "a"]));
    }

    #[test]
    fn manual_links_in_a_chain_are_inert() {
        let host = TagHost::default()
            .with_tag("a", "TrackNo", "2")
            .with_tag("b", "TrackNo", "1");
        let files = members(&["a", "b"]);

        let sorted = sort_members(
            &files,
            &[
                OrderRule::new(MANUAL_ORDER, false),
                OrderRule::new("TrackNo", false),
            ],
            &host,
        )
        .expect("sort");
        assert_eq!(sorted, members(&["b", "a"]));
    }

    #[test]
    fn unrecognized_keys_are_an_error() {
        let host = TagHost::default();
        let files = members(&["a"]);
        let err = sort_members(&files, &[OrderRule::new("Sparkles", false)], &host)
            .expect_err("must fail");
        assert!(err.to_string().contains("Sparkles"));
    }

    proptest::proptest! {
        #[test]
        fn sorted_output_is_a_permutation(track_numbers in proptest::collection::vec(0u8..20, 0..24)) {
            let mut host = TagHost::default();
            let mut files = Vec::new();
            for (index, number) in track_numbers.iter().enumerate() {
                let name = format!("track_{index}");
                host = host.with_tag(&name, "TrackNo", &number.to_string());
                files.push(name);
            }

            let sorted = sort_members(&files, &[OrderRule::new("TrackNo", false)], &host).expect("sort");
            prop_assert_eq!(sorted.len(), files.len());

            let mut expected = files.clone();
            expected.sort();
            let mut actual = sorted.clone();
            actual.sort();
            prop_assert_eq!(actual, expected);

            let values: Vec<i64> = sorted
                .iter()
                .map(|file| host.file_tag(file, TagField::TrackNo).parse().unwrap_or(0))
                .collect();
            prop_assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
        }
    }
}

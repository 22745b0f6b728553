//! Client-side filtering of the visible item list.
//!
//! Complexity: O(n) over the items, each predicate checked cheapest first.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::model::{Category, ItemType, VisibleItem};

use super::html::strip_html;

/// Which side of the ownership split to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OwnerFilter {
    #[default]
    All,
    /// Items the viewer created.
    Owned,
    /// Items others shared with the viewer.
    Shared,
}

impl std::str::FromStr for OwnerFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "owned" | "mine" | "my" => Ok(Self::Owned),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown owner filter '{other}' (all, owned, shared)")),
        }
    }
}

/// Filter settings. `None` means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilters {
    pub owner: OwnerFilter,
    pub category: Option<Category>,
    pub item_type: Option<ItemType>,
    /// Inclusive lower bound, from the start of this day (UTC).
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound, to the end of this day (UTC).
    pub date_to: Option<NaiveDate>,
}

impl ItemFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Apply the search term and the filters, keeping the input order.
///
/// The term is matched case-insensitively as a substring of the plain text
/// of the title, description or transcription. A blank term matches every
/// item. All active filters must hold.
pub fn filter_and_search(
    items: &[VisibleItem],
    search_term: &str,
    filters: &ItemFilters,
) -> Vec<VisibleItem> {
    let needle = search_term.trim().to_lowercase();
    let bounds = DateBounds::new(filters);

    items
        .iter()
        .filter(|item| matches_filters(item, filters, &bounds))
        .filter(|item| needle.is_empty() || matches_term(item, &needle))
        .cloned()
        .collect()
}

/// Whether `item` contains `needle` (already lowercased) in any searchable
/// field.
pub fn matches_term(item: &VisibleItem, needle: &str) -> bool {
    [&item.title, &item.description, &item.transcription]
        .into_iter()
        .any(|field| strip_html(field).to_lowercase().contains(needle))
}

fn matches_filters(item: &VisibleItem, filters: &ItemFilters, bounds: &DateBounds) -> bool {
    let owner_ok = match filters.owner {
        OwnerFilter::All => true,
        OwnerFilter::Owned => item.is_owner,
        OwnerFilter::Shared => !item.is_owner,
    };
    owner_ok
        && filters.category.is_none_or(|c| item.category == c)
        && filters.item_type.is_none_or(|t| item.item_type == t)
        && bounds.contains(item.created_at)
}

/// The date filters as instants.
struct DateBounds {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl DateBounds {
    fn new(filters: &ItemFilters) -> Self {
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
        Self {
            from: filters
                .date_from
                .map(|d| d.and_time(NaiveTime::default()).and_utc()),
            to: filters.date_to.map(|d| d.and_time(end_of_day).and_utc()),
        }
    }

    /// An item without a timestamp fails any bound that is set.
    fn contains(&self, created_at: Option<DateTime<Utc>>) -> bool {
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        let Some(at) = created_at else {
            return false;
        };
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArchiveItem;
    use chrono::TimeZone;

    fn visible(id: &str, is_owner: bool, created: Option<DateTime<Utc>>) -> VisibleItem {
        VisibleItem {
            item: ArchiveItem {
                id: id.into(),
                owner_id: if is_owner { "me".into() } else { "other".into() },
                owner_email: "x@x.com".into(),
                title: format!("Item {id}"),
                item_type: ItemType::Photo,
                category: Category::Personal,
                description: String::new(),
                transcription: String::new(),
                related_date: String::new(),
                physical_location: String::new(),
                shared_with: vec![],
                files: vec![],
                created_at: created,
                updated_at: None,
            },
            is_owner,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).single()
    }

    fn ids(items: &[VisibleItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_empty_term_and_filters_return_everything_in_order() {
        let items = vec![
            visible("b", true, None),
            visible("a", false, at(2020, 1, 1, 0, 0, 0)),
        ];
        let out = filter_and_search(&items, "   ", &ItemFilters::default());
        assert_eq!(ids(&out), vec!["b", "a"]);
        assert!(filter_and_search(&[], "x", &ItemFilters::default()).is_empty());
    }

    #[test]
    fn test_search_matches_stripped_description() {
        let mut item = visible("1", true, None);
        item.item.description = "<b>Grandpa's medal</b>".into();
        let items = vec![item, visible("2", true, None)];
        assert_eq!(ids(&filter_and_search(&items, "medal", &ItemFilters::default())), vec!["1"]);
        assert_eq!(ids(&filter_and_search(&items, "MEDAL", &ItemFilters::default())), vec!["1"]);
        // Markup itself is not searchable.
        assert!(filter_and_search(&items, "<b>", &ItemFilters::default()).is_empty());
    }

    #[test]
    fn test_search_covers_title_and_transcription() {
        let mut letter = visible("1", true, None);
        letter.item.transcription = "Dear Mary, the war is over".into();
        let items = vec![letter, visible("2", true, None)];
        assert_eq!(ids(&filter_and_search(&items, "war", &ItemFilters::default())), vec!["1"]);
        assert_eq!(ids(&filter_and_search(&items, "item 2", &ItemFilters::default())), vec!["2"]);
    }

    #[test]
    fn test_owner_filter() {
        let items = vec![visible("mine", true, None), visible("theirs", false, None)];
        let mut filters = ItemFilters {
            owner: OwnerFilter::Owned,
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_search(&items, "", &filters)), vec!["mine"]);
        filters.owner = OwnerFilter::Shared;
        assert_eq!(ids(&filter_and_search(&items, "", &filters)), vec!["theirs"]);
    }

    #[test]
    fn test_category_and_type_filters_compose() {
        let mut letter = visible("letter", true, None);
        letter.item.item_type = ItemType::LetterCorrespondence;
        letter.item.category = Category::FamilyHistory;
        let mut photo = visible("photo", true, None);
        photo.item.category = Category::FamilyHistory;
        let items = vec![letter, photo, visible("other", true, None)];

        let filters = ItemFilters {
            category: Some(Category::FamilyHistory),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_search(&items, "", &filters)), vec!["letter", "photo"]);

        let filters = ItemFilters {
            category: Some(Category::FamilyHistory),
            item_type: Some(ItemType::Photo),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_search(&items, "", &filters)), vec!["photo"]);
    }

    #[test]
    fn test_date_bounds_are_inclusive_whole_days() {
        let items = vec![
            visible("start", true, at(2024, 3, 1, 0, 0, 0)),
            visible("end", true, at(2024, 3, 31, 23, 59, 59)),
            visible("after", true, at(2024, 4, 1, 0, 0, 0)),
            visible("before", true, at(2024, 2, 29, 23, 59, 59)),
            visible("undated", true, None),
        ];
        let filters = ItemFilters {
            date_from: NaiveDate::from_ymd_opt(2024, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_search(&items, "", &filters)), vec!["start", "end"]);

        let only_to = ItemFilters {
            date_to: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        };
        assert_eq!(ids(&filter_and_search(&items, "", &only_to)), vec!["start", "before"]);
    }

    #[test]
    fn test_owner_filter_parse() {
        assert_eq!("Owned".parse(), Ok(OwnerFilter::Owned));
        assert_eq!("shared".parse(), Ok(OwnerFilter::Shared));
        assert_eq!("".parse(), Ok(OwnerFilter::All));
        assert!("friends".parse::<OwnerFilter>().is_err());
    }
}

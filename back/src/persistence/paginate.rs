pub const DEFAULT_OFFSET: i64 = 0;
pub const MAX_LIMIT: i64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagingOptions {
    pub offset: i64,
    pub limit: i64,
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
            limit: MAX_LIMIT,
        }
    }
}

/// Adjusts paging options in place before a listing query runs.
pub trait PagingConfigurator: Sync {
    fn configure(&self, options: &mut PagingOptions);
}

impl<F> PagingConfigurator for F
where
    F: Fn(&mut PagingOptions) + Sync,
{
    fn configure(&self, options: &mut PagingOptions) {
        self(options)
    }
}

/// Partial update of the paging window, as read from a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    /// Values that do not parse as integers are dropped.
    pub fn parse(offset: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            offset: offset.and_then(|value| value.parse().ok()),
            limit: limit.and_then(|value| value.parse().ok()),
        }
    }
}

impl PagingConfigurator for PageRequest {
    fn configure(&self, options: &mut PagingOptions) {
        if let Some(limit) = self.limit {
            options.limit = limit;
        }

        if let Some(offset) = self.offset {
            options.offset = offset;
        }
    }
}

/// Applies the configurators in order over the defaults, then clamps.
pub fn paginate(configurators: &[&dyn PagingConfigurator]) -> PagingOptions {
    let mut options = PagingOptions::default();

    for configurator in configurators {
        configurator.configure(&mut options);
    }

    // the two clamps are independent of each other
    if options.limit > MAX_LIMIT || options.limit < 0 {
        options.limit = MAX_LIMIT;
    }

    if options.offset < 0 {
        options.offset = 0;
    }

    options
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_without_configurators() {
        assert_eq!(
            paginate(&[]),
            PagingOptions {
                offset: 0,
                limit: 50
            }
        );
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(49, 49)]
    #[case(50, 50)]
    #[case(51, 50)]
    #[case(1000, 50)]
    #[case(-1, 50)]
    fn limit_is_capped(#[case] requested: i64, #[case] expected: i64) {
        let configure = move |options: &mut PagingOptions| options.limit = requested;
        assert_eq!(paginate(&[&configure]).limit, expected);
    }

    #[rstest]
    #[case(-1, 0)]
    #[case(-100, 0)]
    #[case(0, 0)]
    #[case(7, 7)]
    fn negative_offset_becomes_zero(#[case] requested: i64, #[case] expected: i64) {
        let configure = move |options: &mut PagingOptions| options.offset = requested;
        assert_eq!(paginate(&[&configure]).offset, expected);
    }

    #[test]
    fn both_clamps_apply_in_the_same_request() {
        let configure = |options: &mut PagingOptions| {
            options.limit = 80;
            options.offset = -3;
        };

        assert_eq!(
            paginate(&[&configure]),
            PagingOptions {
                offset: 0,
                limit: 50
            }
        );
    }

    #[test]
    fn later_configurators_override_earlier_ones() {
        let first = |options: &mut PagingOptions| {
            options.limit = 10;
            options.offset = 4;
        };
        let second = |options: &mut PagingOptions| options.limit = 20;

        assert_eq!(
            paginate(&[&first, &second]),
            PagingOptions {
                offset: 4,
                limit: 20
            }
        );
    }

    #[test]
    fn page_request_ignores_non_integers() {
        let request = PageRequest::parse(Some("abc"), Some("1.5"));
        assert_eq!(request, PageRequest::default());
        assert_eq!(paginate(&[&request]), PagingOptions::default());
    }

    #[test]
    fn page_request_keeps_earlier_values_for_unparsed_fields() {
        let earlier = |options: &mut PagingOptions| {
            options.limit = 5;
            options.offset = 2;
        };
        let request = PageRequest::parse(Some("x"), Some("7"));

        assert_eq!(
            paginate(&[&earlier, &request]),
            PagingOptions {
                offset: 2,
                limit: 7
            }
        );
    }

    #[test]
    fn page_request_parses_negative_numbers() {
        let request = PageRequest::parse(Some("-4"), Some("3"));
        assert_eq!(request.offset, Some(-4));
        assert_eq!(paginate(&[&request]).offset, 0);
    }
}

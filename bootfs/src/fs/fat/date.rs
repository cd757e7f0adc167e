//! DOS packed dates and times.
//!
//! Values are decoded as stored. Corrupt fields yield out-of-range components
//! rather than an error, since a bad timestamp must not hide a file.

/// A DOS date.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default)]
pub struct Date {
    /// Year number, nominally in [1980, 2107].
    year: u16,
    /// Month of the year, nominally in [1, 12].
    month: u8,
    /// Day of the month, nominally in [1, 31].
    day: u8,
}

impl Date {
    const MIN_YEAR: u16 = 1980;

    #[must_use]
    #[inline]
    pub const fn new(year: u16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    #[must_use]
    /// Decodes a packed DOS date: bits 15-9 year since 1980, 8-5 month, 4-0 day.
    pub const fn decode(dos_date: u16) -> Self {
        Self {
            year: (dos_date >> 9) + Self::MIN_YEAR,
            month: ((dos_date >> 5) & 0xF) as u8,
            day: (dos_date & 0x1F) as u8,
        }
    }

    #[must_use]
    #[inline]
    pub const fn year(&self) -> u16 {
        self.year
    }

    #[must_use]
    #[inline]
    pub const fn month(&self) -> u8 {
        self.month
    }

    #[must_use]
    #[inline]
    pub const fn day(&self) -> u8 {
        self.day
    }
}

/// A DOS time.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default)]
pub struct Time {
    hour: u8,
    minute: u8,
    second: u8,
    ms: u16,
}

impl Time {
    #[must_use]
    #[inline]
    pub const fn new(hour: u8, minute: u8, second: u8, ms: u16) -> Self {
        Self {
            hour,
            minute,
            second,
            ms,
        }
    }

    #[must_use]
    /// Decodes a packed DOS time: bits 15-11 hour, 10-5 minute, 4-0 two-second units.
    ///
    /// `tenths` is the creation-time refinement in 10 ms units (0-199), 0 elsewhere.
    pub const fn decode(dos_time: u16, tenths: u8) -> Self {
        Self {
            hour: (dos_time >> 11) as u8,
            minute: ((dos_time >> 5) & 0x3F) as u8,
            second: ((dos_time & 0x1F) * 2) as u8 + tenths / 100,
            ms: (tenths % 100) as u16 * 10,
        }
    }

    #[must_use]
    #[inline]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    #[inline]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    #[must_use]
    #[inline]
    pub const fn second(&self) -> u8 {
        self.second
    }

    #[must_use]
    #[inline]
    pub const fn ms(&self) -> u16 {
        self.ms
    }
}

/// A DOS date and time.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default)]
pub struct DateTime {
    date: Date,
    time: Time,
}

impl DateTime {
    #[must_use]
    #[inline]
    pub const fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    #[must_use]
    #[inline]
    pub const fn decode(dos_date: u16, dos_time: u16, tenths: u8) -> Self {
        Self::new(Date::decode(dos_date), Time::decode(dos_time, tenths))
    }

    #[must_use]
    #[inline]
    pub const fn date(&self) -> Date {
        self.date
    }

    #[must_use]
    #[inline]
    pub const fn time(&self) -> Time {
        self.time
    }
}

impl core::fmt::Display for DateTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.date.year, self.date.month, self.date.day, self.time.hour, self.time.minute, self.time.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Date, DateTime, Time};

    #[test]
    fn date_decode() {
        assert_eq!(Date::decode(33), Date::new(1980, 1, 1));
        assert_eq!(Date::decode(38647), Date::new(2055, 7, 23));
        // 2024-02-29
        assert_eq!(Date::decode((44 << 9) | (2 << 5) | 29), Date::new(2024, 2, 29));
    }

    #[test]
    fn time_decode() {
        assert_eq!(Time::decode(30830, 0), Time::new(15, 3, 28, 0));
        assert_eq!(Time::decode(30830, 199), Time::new(15, 3, 29, 990));
        assert_eq!(Time::decode(30825, 99), Time::new(15, 3, 18, 990));
        // 23:59:58
        assert_eq!(Time::decode((23 << 11) | (59 << 5) | 29, 0), Time::new(23, 59, 58, 0));
    }

    #[test]
    fn datetime_display() {
        let dt = DateTime::decode(38647, 30830, 100);
        assert_eq!(dt.date().year(), 2055);
        assert_eq!(dt.time().second(), 29);
        assert_eq!(alloc::format!("{dt}"), "2055-07-23 15:03:29");
    }
}

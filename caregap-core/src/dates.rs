//! Tiện ích ngày lịch dùng chung cho bộ parse và bộ luật.
//!
//! Mọi ngày trong mô hình hồ sơ đều là ngày lịch thuần. Chuỗi được tách trực
//! tiếp thành năm/tháng/ngày để múi giờ không làm lệch ngày.

use chrono::{Datelike, NaiveDate};

/// Đọc phần `YYYY-MM-DD` đầu của date hoặc dateTime FHIR.
///
/// Phần sau ngày (`T10:00:00Z`, offset) bị bỏ qua.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim().get(..10)?;
    let mut parts = head.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Giải mã mốc thời gian dạng gọn của bản tin phân đoạn (`YYYYMMDD[HHMM[SS]]`).
///
/// Các thành phần lấy theo vị trí cố định, không kiểm tra khoảng giá trị trước.
/// Giá trị không tạo được ngày lịch trả về `None` thay vì lỗi, để bên gọi
/// chuyển sang nguồn kế tiếp.
pub fn decode_compact_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let year = value.get(0..4)?.parse::<i32>().ok()?;
    let month = value.get(4..6)?.parse::<u32>().ok()?;
    let day = value.get(6..8)?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Số năm tròn từ `birth` đến `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Số tháng lịch giữa hai ngày, không xét ngày trong tháng.
///
/// 2024-01-31 đến 2024-02-01 tính là một tháng.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}

/// Dạng hiển thị ngắn, ví dụ `Feb 1, 2025`.
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

//! Entry list and payload fixtures

/// Header row with every recognized column
pub const FULL_HEADER: &str = "url,format,identifier,title,description,dataset__title__survey_date";

/// `テスト,データ,123` encoded as Shift_JIS
pub const SJIS_TABLE: &[u8] = b"\x83\x65\x83\x58\x83\x67,\x83\x66\x81\x5b\x83\x5e,123";

/// Decoded form of [`SJIS_TABLE`]
pub const SJIS_TABLE_TEXT: &str = "テスト,データ,123";

/// A minimal getMetaInfo-shaped response
pub fn meta_info(stats_data_id: &str) -> serde_json::Value {
    serde_json::json!({
        "GET_META_INFO": {
            "RESULT": {"STATUS": 0, "ERROR_MSG": "正常に終了しました。"},
            "PARAMETER": {"STATS_DATA_ID": stats_data_id},
            "METADATA_INF": {
                "TABLE_INF": {"@id": stats_data_id, "STAT_NAME": {"$": "国勢調査"}}
            }
        }
    })
}

/// Build an entry list from `rows`, each already formatted as CSV
pub fn entry_list(rows: &[String]) -> String {
    let mut list = String::from(FULL_HEADER);
    list.push('\n');
    for row in rows {
        list.push_str(row);
        list.push('\n');
    }
    list
}

use osdetect::osdb::{
    all_os_set, df_candidates, ip_layer_candidates, is_windows_label, linux_family,
    mss_candidates, tcp_layer_candidates, ttl_candidates, ttl_range_candidates,
    win_size_candidates, windows_family, ALL_OS,
};

#[test]
fn label_set_is_normalized() {
    let all = all_os_set();
    assert_eq!(all.len(), ALL_OS.len());
    assert!(all.contains("Debian"));
    assert!(all.contains("Windows 8"));
}

#[test]
fn windows_labels_are_recognized() {
    assert!(is_windows_label("Windows 11"));
    assert!(is_windows_label("windows xp"));
    assert!(!is_windows_label("Linux"));
    assert!(!is_windows_label("FreeBSD"));
}

#[test]
fn ttl_analyzer_estimates_initial_ttl() {
    let linuxish = ttl_candidates(64);
    assert!(linuxish.contains("Linux"));
    assert!(linuxish.contains("Ubuntu"));
    assert!(!linuxish.contains("Windows 10"));

    // 63 rounds up to 64, 65 rounds up to 128
    assert_eq!(ttl_candidates(63), ttl_candidates(64));
    let windowsish = ttl_candidates(65);
    assert!(windowsish.contains("Windows 10"));
    assert!(!windowsish.contains("Linux"));

    let exotic = ttl_candidates(200);
    assert!(exotic.contains("Symbian"));
    assert!(exotic.contains("Debian"));
}

#[test]
fn unknown_feature_values_yield_empty_sets() {
    // next power of two of 20 is 32, which has no table entry, and the
    // range heuristic does not cover TTLs at or below 32 either
    assert!(ttl_candidates(20).is_empty());
    assert!(win_size_candidates(12345).is_empty());
    assert!(mss_candidates(999).is_empty());
}

#[test]
fn ttl_range_fallback_matches_the_documented_ranges() {
    assert!(ttl_range_candidates(50).contains("Centos"));
    let mid = ttl_range_candidates(100);
    assert!(mid.contains("Windows XP"));
    assert!(mid.contains("Windows 10"));
    assert!(!mid.contains("Windows 11"));
    assert!(ttl_range_candidates(200).contains("Palm OS"));
    assert!(ttl_range_candidates(30).is_empty());
}

#[test]
fn ip_layer_intersects_df_and_ttl() {
    // DF set with TTL 64: only the Unix side survives
    let set = ip_layer_candidates(true, 64);
    assert!(set.contains("Linux"));
    assert!(set.contains("FreeBSD"));
    assert!(!set.contains("Windows 10"));

    // DF set with TTL 120 (initial 128): only Windows survives
    let set = ip_layer_candidates(true, 120);
    assert!(set.contains("Windows 11"));
    assert!(!set.contains("Linux"));
}

#[test]
fn tcp_layer_pools_window_and_mss_matches() {
    let set = tcp_layer_candidates(8192, 1440);
    assert!(set.contains("Windows 7"));
    assert!(set.contains("Symbian"));
    assert!(!set.contains("Linux"));

    let set = tcp_layer_candidates(65535, 1460);
    assert!(set.contains("Linux"));
    assert!(set.contains("FreeBSD"));
    assert!(set.contains("Windows 10"));
}

#[test]
fn df_tables_differ_on_the_fragmenting_side() {
    assert!(df_candidates(true).contains(&"Debian"));
    assert!(!df_candidates(false).contains(&"Debian"));
    assert!(df_candidates(false).contains(&"Symbian"));
    assert!(!df_candidates(true).contains(&"Symbian"));
}

#[test]
fn family_sets_stay_inside_the_label_universe() {
    let all = all_os_set();
    assert!(windows_family().iter().all(|os| all.contains(os)));
    assert!(linux_family().iter().all(|os| all.contains(os)));
    assert!(windows_family().contains("Windows 8"));
    assert!(!linux_family().contains("FreeBSD"));
}

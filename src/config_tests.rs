use super::*;

#[test]
fn section_key_becomes_default_name_and_configs() {
    let cfg: PreallocateConfig = toml::from_str(
        r#"
        [small]
        jobs = 2
        "#,
    )
    .unwrap();
    let pools = cfg.into_pool_configs();

    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].name, "small");
    assert_eq!(pools[0].configs, vec!["small".to_string()]);
    assert_eq!(pools[0].jobs, 2);
}

#[test]
fn explicit_name_and_configs_override_the_section_key() {
    let cfg: PreallocateConfig = toml::from_str(
        r#"
        [small]
        name = "renamed"
        configs = ["bwa", "gatk"]
        jobs = 3
        persist = true
        "#,
    )
    .unwrap();
    let pools = cfg.into_pool_configs();

    assert_eq!(pools[0].name, "renamed");
    assert_eq!(pools[0].configs, vec!["bwa".to_string(), "gatk".to_string()]);
    assert!(pools[0].persist);
}

#[test]
fn configs_accepts_a_bare_string_as_a_singleton_list() {
    let cfg: PreallocateConfig = toml::from_str(
        r#"
        [small]
        configs = "bwa"
        "#,
    )
    .unwrap();
    assert_eq!(cfg.into_pool_configs()[0].configs, vec!["bwa".to_string()]);
}

#[test]
fn jobs_defaults_to_one() {
    let cfg: PreallocateConfig = toml::from_str("[small]\n").unwrap();
    assert_eq!(cfg.into_pool_configs()[0].jobs, 1);
}

#[test]
fn walltime_accepts_hh_mm_ss_strings() {
    let cfg: PreallocateConfig = toml::from_str(
        r#"
        [small]
        walltime = "01:00:00"
        "#,
    )
    .unwrap();
    assert_eq!(cfg.into_pool_configs()[0].walltime, Some(Duration::from_secs(3_600)));
}

#[test]
fn declaration_order_is_preserved_across_multiple_sections() {
    let cfg: PreallocateConfig = toml::from_str(
        r#"
        [zeta]
        [alpha]
        [middle]
        "#,
    )
    .unwrap();
    let names: Vec<_> = cfg.into_pool_configs().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["zeta".to_string(), "alpha".to_string(), "middle".to_string()]);
}

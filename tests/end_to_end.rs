//! End-to-end runs over small input files.

use graphlan_export::config::ExportConfig;
use graphlan_export::error::ExportError;
use graphlan_export::{export_annotations, export_to_files};
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file.flush().unwrap();
    file
}

fn lines_for<'a>(text: &'a str, node: &str) -> Vec<Vec<&'a str>> {
    text.lines()
        .map(|l| l.split('\t').collect::<Vec<_>>())
        .filter(|f| f.len() == 3 && f[0] == node)
        .collect()
}

#[test]
fn biomarker_only_single_row() {
    let lefse = write_temp("Phylum_X\t50\tGroupA\t3.0\t0.01\n");
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree.txt");
    let annot = dir.path().join("annot.txt");

    let config = ExportConfig {
        lefse_output: Some(lefse.path().to_path_buf()),
        abundance_threshold: 0.0,
        ..Default::default()
    };
    export_to_files(config, &tree, &annot).unwrap();

    let tree_text = std::fs::read_to_string(&tree).unwrap();
    assert_eq!(tree_text, "Phylum_X\n");

    let annot_text = std::fs::read_to_string(&annot).unwrap();
    let node = lines_for(&annot_text, "Phylum_X");
    assert!(node.iter().any(|f| f[1] == "clade_marker_size"));
    assert!(node.iter().any(|f| f[1] == "clade_marker_color"));

    let legend = lines_for(&annot_text, "GroupA");
    assert!(legend.iter().any(|f| f[1] == "annotation" && f[2] == "GroupA"));
    assert!(legend.iter().any(|f| f[1] == "clade_marker_color"));
}

#[test]
fn abundance_only_with_level_shading() {
    let table = write_temp(
        "id\ts1\ts2\n\
         k__A|p__B|c__C\t10\t10\n\
         k__A|p__B|c__D\t80\t100\n\
         k__A|p__E|c__F\t30\t30\n\
         k__G|p__H|c__I\t5\t5\n",
    );
    let results = export_annotations(ExportConfig {
        abundance_table: Some(table.path().to_path_buf()),
        background_levels: vec![2],
        least_biomarkers: 2,
        ..Default::default()
    })
    .unwrap();

    assert_eq!(
        results.taxa,
        vec!["k__A.p__B.c__C", "k__A.p__B.c__D", "k__A.p__E.c__F", "k__G.p__H.c__I"]
    );
    let text = results.get_annotation_text();

    let shading: Vec<_> = lines_for(&text, "k__A.p__B")
        .into_iter()
        .filter(|f| f[1] == "annotation_background_color")
        .collect();
    assert_eq!(shading.len(), 1);

    // level 1 has k__A and k__G, enough for two synthetic biomarkers
    assert_eq!(results.biomarkers, vec!["k__A", "k__G"]);
    let size = |node: &str| -> f64 {
        lines_for(&text, node)
            .into_iter()
            .find(|f| f[1] == "clade_marker_size")
            .unwrap()[2]
            .parse()
            .unwrap()
    };
    assert!(size("k__A.p__B.c__D") > size("k__A.p__B.c__C"));
    assert!(results.warnings.is_empty());
}

#[test]
fn biom_input_is_flattened() {
    let biom = write_temp(
        r#"{
            "id": "t",
            "rows": [
                {"id": "o1", "metadata": {"taxonomy": ["k__A", "p__B"]}},
                {"id": "o2", "metadata": {"taxonomy": ["k__A", "p__C"]}}
            ],
            "columns": [{"id": "s1"}, {"id": "s2"}],
            "matrix_type": "dense",
            "data": [[1, 3], [10, 10]],
            "shape": [2, 2]
        }"#,
    );
    let lefse = write_temp("k__A.p__C\t3.1\tcase\t3.5\t0.001\nk__A.p__B\t1.2\tctrl\t2.0\t0.01\n");

    let results = export_annotations(ExportConfig {
        biom_table: Some(biom.path().to_path_buf()),
        lefse_output: Some(lefse.path().to_path_buf()),
        annotations: vec![2],
        ..Default::default()
    })
    .unwrap();

    assert_eq!(results.taxa, vec!["k__A.p__B", "k__A.p__C"]);
    let text = results.get_annotation_text();
    let c = lines_for(&text, "k__A.p__C");
    assert!(c.iter().any(|f| f[1] == "annotation" && f[2] == "*"));
    assert!(c.iter().any(|f| f[1] == "annotation_font_size" && f[2] == "10"));
}

#[test]
fn malformed_lefse_row_aborts_before_output() {
    let lefse = write_temp("A\t1.0\tg\t2.0\t0.1\nB\t1.0\n");
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree.txt");
    let annot = dir.path().join("annot.txt");

    let err = export_to_files(
        ExportConfig {
            lefse_output: Some(lefse.path().to_path_buf()),
            ..Default::default()
        },
        &tree,
        &annot,
    )
    .unwrap_err();

    assert!(matches!(err, ExportError::MalformedRow { line: 2, .. }));
    assert!(!tree.exists());
    assert!(!annot.exists());
}

#[test]
fn inverted_bounds_are_reset_with_warning() {
    let lefse = write_temp("A\t1.0\tg\t2.0\t0.1\n");
    let results = export_annotations(ExportConfig {
        lefse_output: Some(lefse.path().to_path_buf()),
        min_font_size: 30,
        abundance_threshold: 0.0,
        ..Default::default()
    })
    .unwrap();
    assert_eq!(results.warnings.len(), 1);
    assert!(results.warnings[0].contains("min_font_size"));
}

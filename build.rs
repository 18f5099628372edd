use std::fs;
use std::path::Path;

// 把 migrations/*.sql 按文件名顺序嵌入二进制，供 `tokenpair migrate` 使用
fn main() {
    println!("cargo:rerun-if-changed=migrations/");

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR 未设置");
    let dest_path = Path::new(&out_dir).join("migrations.rs");

    let mut names: Vec<String> = fs::read_dir("migrations")
        .map(|dir| {
            dir.filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().to_string())
                .filter(|name| name.ends_with(".sql"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();

    let entries: Vec<String> = names
        .iter()
        .map(|file| {
            format!(
                "    (\"{}\", include_str!(concat!(env!(\"CARGO_MANIFEST_DIR\"), \"/migrations/{}\"))),",
                file.trim_end_matches(".sql"),
                file
            )
        })
        .collect();

    let source = format!(
        "/// 内嵌的数据库迁移（名称, SQL）\npub const MIGRATIONS: &[(&str, &str)] = &[\n{}\n];\n",
        entries.join("\n")
    );
    fs::write(&dest_path, source).expect("无法写入 migrations.rs");
}

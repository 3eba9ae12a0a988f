use serde_json::json;
use vfs_tree::ops::{
    LinkOption, is_file, is_symlink, list_directory, read_all_lines, read_symlink_target,
};
use vfs_tree::{DirFS, FsBackend, PathLike, build_tree, join};

fn main() {
    let tmp = std::env::temp_dir();
    println!("Temp dir: {}", tmp.display());

    // creates `/tmp/my_tree` on host and remembers it as created
    let mut fs = DirFS::new(tmp.join("my_tree")).unwrap();

    // the whole literal is checked first, then nodes are created in declared order
    build_tree(
        &mut fs,
        "/",
        &json!([
            ["docs", ["hello.txt", "Hello,", "World!"]],
            ["latest", {"type": "sym-link", "link-to": "/docs/hello.txt"}],
            ["backup", {"type": "link", "link-to": "/docs/hello.txt"}]
        ]),
    )
    .unwrap();

    let root = join(&fs, PathLike::Root, &[]).unwrap();
    for entry in list_directory(&fs, &root, None).unwrap() {
        let entry = entry.unwrap();
        if is_symlink(&fs, &entry) {
            let target = read_symlink_target(&fs, &entry).unwrap();
            println!("{entry} -> {target}");
        } else {
            println!("{entry}");
        }
    }

    // `latest` is followed transparently
    let latest = join(&fs, "/latest".into(), &[]).unwrap();
    println!("{}", read_all_lines(&fs, &latest).unwrap().join(" "));
    assert!(is_file(&fs, &latest, LinkOption::Follow));

    // a hard link is another name of the same content
    assert_eq!(fs.read("/backup").unwrap(), fs.read("/docs/hello.txt").unwrap());

    // At this point `fs` is dropped and every created artifact, `/tmp/my_tree` included,
    // is removed. Use set_auto_clean(false) to keep them.
}

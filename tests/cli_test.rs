use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::{PathBuf,Path};
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

// Make a copy in temporary directory with LF newlines.
// This insulates us against newline substitutions inserted by git or other layers.
fn copy_and_fix_newlines(in_file: PathBuf,temp_dir: &tempfile::TempDir) -> Result<PathBuf,Box<dyn std::error::Error>> {
    let txt = std::fs::read(in_file).expect("could not read input file");
    let new_txt: Vec<u8> = txt.into_iter().filter(|c| *c != 13).collect();
    let new_txt_path = temp_dir.path().join("converted.txt");
    match std::fs::write(&new_txt_path,new_txt) {
        Ok(_) => Ok(new_txt_path),
        Err(e) => Err(Box::new(e))
    }
}

// Compress `base_name.txt` and compare with the file `cmp_name`
fn compress_test(base_name: &str,cmp_name: &str,method: &str) -> STDRESULT {
    let mut cmd = Command::cargo_bin("gbacomp")?;
    let temp_dir = tempfile::tempdir()?;
    let in_path_any_newline = Path::new("tests").join([base_name,".txt"].concat());
    let in_path = copy_and_fix_newlines(in_path_any_newline,&temp_dir)?;
    let cmp_path = Path::new("tests").join(cmp_name);
    let out_path = temp_dir.path().join(cmp_name);
    cmd.arg("compress")
        .arg("-m").arg(method)
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(cmp_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

// Expand the file `in_name` and compare with `base_name.txt`
fn expand_test(in_name: &str,base_name: &str) -> STDRESULT {
    let mut cmd = Command::cargo_bin("gbacomp")?;
    let temp_dir = tempfile::tempdir()?;
    let in_path = Path::new("tests").join(in_name);
    let cmp_path_any_newline = Path::new("tests").join([base_name,".txt"].concat());
    let cmp_path = copy_and_fix_newlines(cmp_path_any_newline,&temp_dir)?;
    let out_path = temp_dir.path().join([base_name,".txt"].concat());
    cmd.arg("expand")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(cmp_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

// Files named `*_ref.*` were produced by the grit/CUE compressors, they pin
// the output to theirs wherever the formats leave no freedom.

#[test]
fn rle_compression() -> STDRESULT {
    compress_test("cartridge","cartridge_ref.rle","rle")
}

#[test]
fn rle_expansion() -> STDRESULT {
    expand_test("cartridge_ref.rle","cartridge")
}

#[test]
fn lz77_compression() -> STDRESULT {
    // nearest match is preferred, so some references differ from the reference file
    compress_test("cartridge","cartridge.lz77","lz77")
}

#[test]
fn lz77_expansion() -> STDRESULT {
    expand_test("cartridge.lz77","cartridge")?;
    expand_test("cartridge_ref.lz77","cartridge")
}

#[test]
fn huffman_compression() -> STDRESULT {
    compress_test("cartridge","cartridge.huf4","huff4")?;
    compress_test("cartridge","cartridge_ref.huf8","huff8")
}

#[test]
fn huffman_expansion() -> STDRESULT {
    expand_test("cartridge.huf4","cartridge")?;
    expand_test("cartridge_ref.huf8","cartridge")
}

#[test]
fn method_mismatch() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let out_path = temp_dir.path().join("cartridge.txt");
    Command::cargo_bin("gbacomp")?
        .arg("expand")
        .arg("-m").arg("huff8")
        .arg("-i").arg(Path::new("tests").join("cartridge.lz77"))
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("FileFormatMismatch"));
    Command::cargo_bin("gbacomp")?
        .arg("expand")
        .arg("-m").arg("lz77")
        .arg("-i").arg(Path::new("tests").join("cartridge.lz77"))
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    Ok(())
}

#[test]
fn header_info() -> STDRESULT {
    Command::cargo_bin("gbacomp")?
        .arg("info")
        .arg("-i").arg(Path::new("tests").join("cartridge.huf4"))
        .assert()
        .success()
        .stdout(predicate::str::contains("method: Huffman4 (0x24)"))
        .stdout(predicate::str::contains("expanded size: 351"));
    Ok(())
}

#[test]
fn unaligned_output() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("runs.bin");
    let out_path = temp_dir.path().join("runs.rle");
    std::fs::write(&in_path,"ABCDDDDD")?;
    Command::cargo_bin("gbacomp")?
        .arg("compress")
        .arg("-m").arg("rle")
        .arg("--no-align")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    assert_eq!(std::fs::read(&out_path)?,vec![0x30,0x08,0x00,0x00,0x02,0x41,0x42,0x43,0x82,0x44]);
    Ok(())
}

#[test]
fn unsafe_vram() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("fill.bin");
    let out_path = temp_dir.path().join("fill.lz77");
    std::fs::write(&in_path,[0x41u8;64])?;
    Command::cargo_bin("gbacomp")?
        .arg("compress")
        .arg("-m").arg("lz77")
        .arg("--unsafe-vram")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    assert_eq!(std::fs::read(&out_path)?,vec![0x10,0x40,0x00,0x00,0x78,0x41,0xf0,0x00,0xf0,0x00,0xf0,0x00,0x60,0x00,0x00,0x00]);
    Ok(())
}

#[test]
fn corrupt_input() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("bad.rle");
    let out_path = temp_dir.path().join("bad.txt");
    std::fs::write(&in_path,[0x30u8,0x40,0x00,0x00,0x85])?;
    Command::cargo_bin("gbacomp")?
        .arg("expand")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CorruptStream"));
    Ok(())
}

use clap::{arg,crate_version,Command};
use gbacomp::{stream,Header,Method,STD_OPTIONS};
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        std::io::stdin().read_line(&mut ans).expect("could not read stdin");
        if ans.trim_end()=="y" || ans.trim_end()=="Y" {
            return true;
        }
        return false;
    }
    true
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `gbacomp compress -m lz77 -i my_expanded -o my_compressed`
Expand:        `gbacomp expand -i my_compressed -o my_expanded`
Inspect:       `gbacomp info -i my_compressed`";

    let methods = ["rle","lz77","huff4","huff8"];

    let mut main_cmd = Command::new("gbacomp")
        .about("Compress and expand with Game Boy Advance BIOS formats")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "compression algorithm").value_parser(methods)
            .required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(--"unsafe-vram" "allow LZ77 references to the previous byte"))
        .arg(arg!(--"no-align" "do not pad the output to a multiple of 4 bytes"))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-m --method <METHOD> "fail unless the file uses this algorithm").value_parser(methods)
            .required(false))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("expand a file"));

    main_cmd = main_cmd.subcommand(Command::new("info")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .about("show the header of a compressed file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = Method::from_name(cmd.get_one::<String>("method").expect(RCH)).expect(RCH);
        let mut opt = STD_OPTIONS;
        opt.vram_safe = !cmd.get_flag("unsafe-vram");
        opt.word_align = !cmd.get_flag("no-align");
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = stream::compress(&mut in_file,&mut out_file,method,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let compressed = std::fs::read(path_in)?;
        if let Some(name) = cmd.get_one::<String>("method") {
            let found = gbacomp::peek_method(&compressed)?;
            if Method::from_name(name) != Some(found) {
                eprintln!("{} is compressed with {}",path_in,found);
                return Err(Box::new(gbacomp::Error::FileFormatMismatch));
            }
        }
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = stream::expand(&mut std::io::Cursor::new(&compressed),&mut out_file)?;
        out_file.set_len(out_size)?;
        eprintln!("expanded {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("info") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let compressed = std::fs::read(path_in)?;
        let header = Header::parse(&compressed)?;
        println!("method: {} ({:#04x})",header.method,header.method.tag());
        println!("expanded size: {}",header.size);
        println!("compressed size: {}",compressed.len());
    }

    Ok(())
}

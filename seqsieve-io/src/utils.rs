use std::fs::File;
use std::io::{stderr, stdout, Write};
use std::path::Path;

/// Creates a `Writer` object.
///
/// Attempts to open a file under a given name. However, if the name is `"stdout"` or
/// `"stderr"`, the returned `Writer` will be connected to either `stdout` or `stderr`
/// stream, respectively. Empty file name also results in writing to `stdout`.
pub fn out_writer(out_fname: &str, if_append: bool) -> Box<dyn Write + Send> {
    match out_fname {
        "" | "stdout" => Box::new(stdout()) as Box<dyn Write + Send>,
        "stderr" => Box::new(stderr()) as Box<dyn Write + Send>,
        _ => {
            let path = Path::new(out_fname);
            if if_append {
                let file = match File::options().append(true).create(true).open(path) {
                    Ok(file) => file,
                    Err(e) => panic!("can't open >{:?}<, error is: {:?}", &path, e),
                };
                Box::new(file) as Box<dyn Write + Send>
            } else {
                let file = match File::create(path) {
                    Ok(file) => file,
                    Err(e) => panic!("can't open >{:?}<, error is: {:?}", &path, e),
                };
                Box::new(file) as Box<dyn Write + Send>
            }
        }
    }
}

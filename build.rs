use chrono::Utc;

fn main() {
    // Get the current time
    let now = Utc::now();
    println!("cargo:rustc-env=BUILD_TIME={}", now.to_rfc3339());
}

use grcnn_rs::{OperatingPoint, Report};

/// Prints the per-length and per-market tables to stdout.
pub fn print_summary(report: &Report) {
    let evaluation = &report.evaluation;
    let counts = &evaluation.counts;
    println!(
        "scored {} of {} rows ({} without ground truth), exact matches: {}",
        counts.scored, counts.rows, counts.skipped_empty_truth, counts.exact_matches
    );
    if let Some(accuracy) = evaluation.accuracy {
        println!("accuracy: {accuracy:.3}");
    }

    println!("{:>8} {:>8} {:>8} {:>9}", "length", "true", "total", "accuracy");
    for (length, counter) in &evaluation.by_length {
        println!(
            "{:>8} {:>8} {:>8} {:>9}",
            length,
            counter.true_count,
            counter.total_count,
            format_accuracy(counter.accuracy())
        );
    }

    if !evaluation.by_segment.is_empty() {
        println!("{:>12} {:>8} {:>8} {:>9}", "market", "true", "total", "accuracy");
        for (market, counter) in &evaluation.by_segment {
            println!(
                "{:>12} {:>8} {:>8} {:>9}",
                market,
                counter.true_count,
                counter.total_count,
                format_accuracy(counter.accuracy())
            );
        }
    }

    if let Some(distance) = evaluation.distance.as_ref() {
        println!(
            "distance: mean={:.3} p50={:.1} p90={:.1} p99={:.1} max={:.1}",
            distance.mean, distance.p50, distance.p90, distance.p99, distance.max
        );
    }

    let Some(calibration) = report.calibration.as_ref() else {
        return;
    };
    println!(
        "calibration (accuracy > {}%, max confidence {:.6}):",
        calibration.accuracy_threshold, calibration.max_confidence
    );
    for segment in &calibration.segments {
        match segment.operating_point {
            OperatingPoint::Selected(point) => println!(
                "{:>12}: threshold={:.6} accuracy={:.3}% coverage={:.3}%",
                segment.segment, point.threshold, point.accuracy_percent, point.coverage_percent
            ),
            OperatingPoint::NoViableThreshold => {
                println!("{:>12}: no viable threshold", segment.segment)
            }
        }
    }
}

fn format_accuracy(accuracy: Option<f64>) -> String {
    accuracy.map_or_else(|| "-".to_string(), |a| format!("{a:.3}"))
}
